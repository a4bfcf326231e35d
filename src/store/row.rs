use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::id::{ClassId, ElementId, ModelId};

/// One element row, in the only layout this core requires of the external
/// schema: an identity, a class identifier, the owning model, a generic
/// property bag, and an optional bounding range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRow {
    pub id: ElementId,
    pub class: ClassId,
    pub model: ModelId,
    pub properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ElementRange>,
}

impl ElementRow {
    pub fn new(
        id: ElementId,
        class: ClassId,
        model: ModelId,
        properties: serde_json::Value,
        range: Option<ElementRange>,
    ) -> Self {
        ElementRow {
            id,
            class,
            model,
            properties,
            range,
        }
    }

    /// The exact wire bytes of this row. Used by the marshalling
    /// compatibility tests: a build with no handler registered must
    /// produce these bytes bit-for-bit.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// A single journaled row mutation, carrying the before/after images the
/// transaction manager needs for rollback and the revision manager needs
/// for changeset deltas.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOp {
    Insert { after: ElementRow },
    Update { before: ElementRow, after: ElementRow },
    Delete { before: ElementRow },
}

impl RowOp {
    pub fn element_id(&self) -> ElementId {
        match self {
            RowOp::Insert { after } => after.id,
            RowOp::Update { after, .. } => after.id,
            RowOp::Delete { before } => before.id,
        }
    }

    pub fn model_id(&self) -> ModelId {
        match self {
            RowOp::Insert { after } => after.model,
            RowOp::Update { after, .. } => after.model,
            RowOp::Delete { before } => before.model,
        }
    }

    pub fn class_id(&self) -> ClassId {
        match self {
            RowOp::Insert { after } => after.class,
            RowOp::Update { after, .. } => after.class,
            RowOp::Delete { before } => before.class,
        }
    }
}

/// The narrow seam between this core and whatever owns the real schema.
/// Implementations must be safe to call from the access thread only; the
/// repository enforces the threading contract above this trait.
pub trait RowStore: Send + Sync {
    fn get(&self, id: ElementId) -> Result<Option<ElementRow>, StoreError>;

    /// Insert or replace; returns the replaced row, if any.
    fn put(&self, row: ElementRow) -> Result<Option<ElementRow>, StoreError>;

    /// Remove; returns the removed row, if any.
    fn remove(&self, id: ElementId) -> Result<Option<ElementRow>, StoreError>;

    /// Default id allocation, used whenever no class handler claims the
    /// assignment.
    fn next_id(&self) -> ElementId;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
