use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::id::ClassId;

use super::ClassHandler;

/// Binds class names to handler instances and answers per-class lookups.
///
/// Registration is by logical class name ("Domain:Class"); resolution is
/// by interned class id, computed once and cached for the lifetime of
/// the connection. Misses are cached too — classes without a handler are
/// the common case, not an error.
pub struct ClassHandlerRegistry {
    by_name: RwLock<HashMap<String, Arc<dyn ClassHandler>>>,
    resolved: RwLock<HashMap<ClassId, Option<Arc<dyn ClassHandler>>>>,
}

impl ClassHandlerRegistry {
    pub fn new() -> Self {
        ClassHandlerRegistry {
            by_name: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for `name`. Returns `false`, with no side
    /// effects, if an entry for `name` already exists; the first
    /// registration stays active.
    pub fn register(&self, name: &str, handler: Arc<dyn ClassHandler>) -> bool {
        let mut by_name = match self.by_name.write() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if by_name.contains_key(name) {
            return false;
        }
        by_name.insert(name.to_string(), handler);
        drop(by_name);

        // A cached miss for this class would now be stale.
        if let Ok(mut resolved) = self.resolved.write() {
            resolved.clear();
        }
        true
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.by_name
            .read()
            .map(|map| map.contains_key(name))
            .unwrap_or(false)
    }

    /// Resolve the handler for a class, consulting the per-id cache
    /// first. `name` is the class's logical name, used only to fill a
    /// cold cache slot.
    pub fn resolve(&self, class: ClassId, name: &str) -> Option<Arc<dyn ClassHandler>> {
        if let Ok(resolved) = self.resolved.read() {
            if let Some(cached) = resolved.get(&class) {
                return cached.clone();
            }
        }

        let handler = self
            .by_name
            .read()
            .ok()
            .and_then(|map| map.get(name).cloned());

        if let Ok(mut resolved) = self.resolved.write() {
            resolved.insert(class, handler.clone());
        }
        handler
    }

    pub fn len(&self) -> usize {
        self.by_name.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ClassHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
