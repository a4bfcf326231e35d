use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::id::ElementId;

use super::{ElementRow, RowStore};

/// Reference row store backed by a locked map. Stands in for the external
/// relational schema in tests and in-process use; the id sequence starts
/// at 1 so the zero sentinel is never allocated.
pub struct InMemoryRowStore {
    rows: RwLock<HashMap<ElementId, ElementRow>>,
    sequence: AtomicU64,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        InMemoryRowStore {
            rows: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore for InMemoryRowStore {
    fn get(&self, id: ElementId) -> Result<Option<ElementRow>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("row read"))?;
        Ok(rows.get(&id).cloned())
    }

    fn put(&self, row: ElementRow) -> Result<Option<ElementRow>, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::LockPoisoned("row write"))?;
        Ok(rows.insert(row.id, row))
    }

    fn remove(&self, id: ElementId) -> Result<Option<ElementRow>, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::LockPoisoned("row remove"))?;
        Ok(rows.remove(&id))
    }

    fn next_id(&self) -> ElementId {
        ElementId::new(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    fn len(&self) -> Result<usize, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned("row read"))?;
        Ok(rows.len())
    }
}
