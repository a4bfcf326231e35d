mod instances;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::{DbRole, StoreConfig};
use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::handler::{ClassHandler, ClassHandlerRegistry};
use crate::id::{ClassId, ElementId, ModelId};
use crate::model::{Model, ModelKind};
use crate::revision::{ChangeOp, ChangeRecord, Revision, RevisionManager, RevisionStart, RowImage};
use crate::store::{InMemoryRowStore, RowOp, RowStore};
use crate::txn::{AccessGuard, CacheTransaction, TransactionManager};

struct ClassTable {
    by_name: HashMap<String, ClassId>,
    names: Vec<String>,
}

impl ClassTable {
    fn new() -> Self {
        ClassTable {
            by_name: HashMap::new(),
            names: Vec::new(),
        }
    }

    fn intern(&mut self, name: &str) -> ClassId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = ClassId::new(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    fn name(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.get() as usize).map(|s| s.as_str())
    }
}

/// One open database connection: the instance repository, its class
/// handler registry, the per-model range indexes, and the transaction
/// and revision managers — all connection-scoped, never shared between
/// connections.
///
/// The thread that calls [`open`] becomes the connection's access
/// thread. Reads are free; transaction-starting and mutating calls from
/// any other thread return [`StoreError::WrongThread`] unless that
/// thread opted in through [`enable_unsafe_access`].
///
/// [`open`]: Repository::open
/// [`enable_unsafe_access`]: Repository::enable_unsafe_access
pub struct Repository {
    config: StoreConfig,
    access: AccessGuard,
    rows: Box<dyn RowStore>,
    registry: ClassHandlerRegistry,
    classes: RwLock<ClassTable>,
    models: RwLock<HashMap<ModelId, Model>>,
    next_model: AtomicU64,
    txn: TransactionManager,
    revisions: RevisionManager,
}

impl Repository {
    pub fn open(config: StoreConfig) -> Self {
        Self::open_with_store(Box::new(InMemoryRowStore::new()), config)
    }

    /// Open over a caller-supplied row store, for embedders that own the
    /// real schema.
    pub fn open_with_store(rows: Box<dyn RowStore>, config: StoreConfig) -> Self {
        let revisions = RevisionManager::new(config.role, config.revision_dir.clone());
        debug!(role = ?config.role, "repository opened");
        Repository {
            access: AccessGuard::new(),
            rows,
            registry: ClassHandlerRegistry::new(),
            classes: RwLock::new(ClassTable::new()),
            models: RwLock::new(HashMap::new()),
            next_model: AtomicU64::new(1),
            txn: TransactionManager::new(),
            revisions,
            config,
        }
    }

    pub fn role(&self) -> DbRole {
        self.config.role
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Access policy
    // ------------------------------------------------------------------

    /// Whitelist the calling thread for mutating access on this
    /// connection. The opt-in is connection-scoped; other connections
    /// keep their own policy.
    pub fn enable_unsafe_access(&self) -> Result<(), StoreError> {
        self.access.enable_unsafe_access()
    }

    pub fn disable_unsafe_access(&self) -> Result<(), StoreError> {
        self.access.disable_unsafe_access()
    }

    // ------------------------------------------------------------------
    // Classes and handlers
    // ------------------------------------------------------------------

    /// Register `H` as the handler for `name`. Returns `false`, with no
    /// side effects, when a handler for `name` already exists.
    pub fn register_class_handler<H>(&self, name: &str) -> bool
    where
        H: ClassHandler + Default + 'static,
    {
        self.registry.register(name, Arc::new(H::default()))
    }

    /// Registration variant for handlers that need construction state.
    pub fn register_class_handler_instance(
        &self,
        name: &str,
        handler: Arc<dyn ClassHandler>,
    ) -> bool {
        self.registry.register(name, handler)
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.classes.read().ok().and_then(|t| t.id(name))
    }

    pub fn class_name(&self, id: ClassId) -> Option<String> {
        self.classes
            .read()
            .ok()
            .and_then(|t| t.name(id).map(str::to_string))
    }

    pub(crate) fn intern_class(&self, name: &str) -> Result<ClassId, StoreError> {
        let mut classes = self
            .classes
            .write()
            .map_err(|_| StoreError::LockPoisoned("class table"))?;
        Ok(classes.intern(name))
    }

    pub(crate) fn resolve_handler(
        &self,
        class: ClassId,
        name: &str,
    ) -> Option<Arc<dyn ClassHandler>> {
        self.registry.resolve(class, name)
    }

    /// Access the underlying row store.
    pub fn row_store(&self) -> &dyn RowStore {
        self.rows.as_ref()
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    pub fn create_model(&self, name: &str, kind: ModelKind) -> Result<ModelId, StoreError> {
        self.access.check()?;
        let id = ModelId::new(self.next_model.fetch_add(1, Ordering::Relaxed));
        let mut models = self
            .models
            .write()
            .map_err(|_| StoreError::LockPoisoned("models"))?;
        models.insert(id, Model::new(id, name, kind));
        Ok(id)
    }

    /// Delete a model. Refused while any element still belongs to it.
    pub fn delete_model(&self, id: ModelId) -> Result<(), StoreError> {
        self.access.check()?;
        let mut models = self
            .models
            .write()
            .map_err(|_| StoreError::LockPoisoned("models"))?;
        let model = models.get(&id).ok_or(StoreError::ModelNotFound(id))?;
        if !model.is_empty() {
            return Err(StoreError::ModelNotEmpty(id));
        }
        models.remove(&id);
        Ok(())
    }

    pub fn model_kind(&self, id: ModelId) -> Result<ModelKind, StoreError> {
        self.with_model(id, |m| m.kind())
    }

    pub fn model_element_count(&self, id: ModelId) -> Result<usize, StoreError> {
        self.with_model(id, |m| m.element_count())
    }

    /// The model-wide aggregate range, when its index has one.
    pub fn model_range(&self, id: ModelId) -> Result<ElementRange, StoreError> {
        self.with_model(id, |m| m.range_if_known())?
    }

    /// Staleness stamp of the model's range index. Capture before a
    /// query, compare after: a greater stamp means the results may be
    /// stale.
    pub fn model_index_stamp(&self, id: ModelId) -> Result<u64, StoreError> {
        self.with_model(id, |m| m.index_stamp())
    }

    /// Ids of elements in `model` whose range intersects `range`.
    pub fn query_model_range(
        &self,
        model: ModelId,
        range: &ElementRange,
    ) -> Result<Vec<ElementId>, StoreError> {
        self.with_model(model, |m| m.query_intersecting(range))
    }

    /// Drop and rebuild a model's range index from its current rows.
    /// Used after bulk changes leave the index wholesale-invalid.
    pub fn rebuild_model_index(&self, id: ModelId) -> Result<(), StoreError> {
        self.access.check()?;
        let mut models = self
            .models
            .write()
            .map_err(|_| StoreError::LockPoisoned("models"))?;
        let model = models.get_mut(&id).ok_or(StoreError::ModelNotFound(id))?;

        let mut entries = Vec::new();
        for element in model.element_ids() {
            if let Some(row) = self.rows.get(element)? {
                if let Some(range) = row.range {
                    entries.push((element, range));
                }
            }
        }
        model.rebuild_index(entries);
        Ok(())
    }

    fn with_model<T>(&self, id: ModelId, f: impl FnOnce(&Model) -> T) -> Result<T, StoreError> {
        let models = self
            .models
            .read()
            .map_err(|_| StoreError::LockPoisoned("models"))?;
        let model = models.get(&id).ok_or(StoreError::ModelNotFound(id))?;
        Ok(f(model))
    }

    pub(crate) fn with_model_mut<T>(
        &self,
        id: ModelId,
        f: impl FnOnce(&mut Model) -> T,
    ) -> Result<T, StoreError> {
        let mut models = self
            .models
            .write()
            .map_err(|_| StoreError::LockPoisoned("models"))?;
        let model = models.get_mut(&id).ok_or(StoreError::ModelNotFound(id))?;
        Ok(f(model))
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Begin the connection's single explicit transaction. Fails with
    /// [`StoreError::TransactionActive`] while one is live, and with
    /// [`StoreError::WrongThread`] off the access thread.
    pub fn start_cache_transaction(&self) -> Result<CacheTransaction<'_>, StoreError> {
        self.access.check()?;
        // Writes that arrived before the explicit transaction form
        // their own boundary.
        if let Some(pending) = self.txn.begin_explicit()? {
            self.commit_boundary(pending)?;
        }
        Ok(CacheTransaction::new(self))
    }

    /// Commit an implicit boundary: everything written since the last
    /// boundary, when no explicit transaction is open.
    pub fn save_changes(&self) -> Result<(), StoreError> {
        self.access.check()?;
        let ops = self.txn.take_implicit()?;
        self.commit_boundary(ops)
    }

    pub(crate) fn commit_explicit(&self) -> Result<(), StoreError> {
        let ops = self.txn.end_explicit()?;
        debug!(ops = ops.len(), "cache transaction committed");
        self.commit_boundary(ops)
    }

    pub(crate) fn rollback_explicit(&self) -> Result<(), StoreError> {
        let ops = self.txn.end_explicit()?;
        debug!(ops = ops.len(), "cache transaction rolled back");
        for op in ops.into_iter().rev() {
            self.undo(op)?;
        }
        Ok(())
    }

    pub(crate) fn record_op(&self, op: RowOp) -> Result<(), StoreError> {
        self.txn.record(op)
    }

    fn commit_boundary(&self, ops: Vec<RowOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }
        let records = self.to_change_records(ops)?;
        self.revisions.record_boundary(records)
    }

    fn to_change_records(&self, ops: Vec<RowOp>) -> Result<Vec<ChangeRecord>, StoreError> {
        let classes = self
            .classes
            .read()
            .map_err(|_| StoreError::LockPoisoned("class table"))?;
        let mut records = Vec::with_capacity(ops.len());
        for op in ops {
            let class = classes
                .name(op.class_id())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", op.class_id().get()));
            let record = match op {
                RowOp::Insert { after } => ChangeRecord {
                    element: after.id,
                    model: after.model,
                    class,
                    op: ChangeOp::Insert,
                    before: None,
                    after: Some(RowImage::of(&after)?),
                },
                RowOp::Update { before, after } => ChangeRecord {
                    element: after.id,
                    model: after.model,
                    class,
                    op: ChangeOp::Update,
                    before: Some(RowImage::of(&before)?),
                    after: Some(RowImage::of(&after)?),
                },
                RowOp::Delete { before } => ChangeRecord {
                    element: before.id,
                    model: before.model,
                    class,
                    op: ChangeOp::Delete,
                    before: Some(RowImage::of(&before)?),
                    after: None,
                },
            };
            records.push(record);
        }
        Ok(records)
    }

    /// Reverse one journaled op: restore the row and mirror the inverse
    /// into the owning model's range index.
    fn undo(&self, op: RowOp) -> Result<(), StoreError> {
        match op {
            RowOp::Insert { after } => {
                self.rows.remove(after.id)?;
                self.with_model_mut(after.model, |m| {
                    m.remove_element(after.id, after.range.as_ref())
                })?;
            }
            RowOp::Update { before, after } => {
                self.with_model_mut(before.model, |m| {
                    m.replace_element_range(before.id, after.range.as_ref(), before.range)
                })?;
                self.rows.put(before)?;
            }
            RowOp::Delete { before } => {
                self.with_model_mut(before.model, |m| m.add_element(before.id, before.range))?;
                self.rows.put(before)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Revisions
    // ------------------------------------------------------------------

    /// Open a revision draft. A no-op on a master copy; an error while a
    /// draft is already accumulating.
    pub fn start_create_revision(&self) -> Result<RevisionStart, StoreError> {
        self.access.check()?;
        self.revisions.start_create_revision()
    }

    /// Seal the open draft into a durable, immutable revision.
    pub fn finish_create_revision(&self) -> Result<Arc<Revision>, StoreError> {
        self.access.check()?;
        self.revisions.finish_create_revision()
    }

    /// Discard the open draft, leaving no trace in the revision log.
    pub fn abandon_create_revision(&self) -> Result<(), StoreError> {
        self.access.check()?;
        self.revisions.abandon_create_revision()
    }

    pub fn revisions(&self) -> Result<Vec<Arc<Revision>>, StoreError> {
        self.revisions.revisions()
    }

    pub fn has_pending_changes(&self) -> Result<bool, StoreError> {
        self.revisions.has_pending_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn repo() -> Repository {
        Repository::open(StoreConfig::default())
    }

    #[test]
    fn create_and_delete_empty_model() {
        let repo = repo();
        let model = repo.create_model("Plan", ModelKind::Drawing).unwrap();
        assert_eq!(repo.model_element_count(model).unwrap(), 0);
        repo.delete_model(model).unwrap();
        assert!(matches!(
            repo.model_kind(model),
            Err(StoreError::ModelNotFound(_))
        ));
    }

    #[test]
    fn delete_unknown_model_fails() {
        let repo = repo();
        assert!(matches!(
            repo.delete_model(ModelId::new(9)),
            Err(StoreError::ModelNotFound(_))
        ));
    }

    #[test]
    fn class_interning_is_stable() {
        let repo = repo();
        let a = repo.intern_class("Test:Foo").unwrap();
        let b = repo.intern_class("Test:Foo").unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.class_id("Test:Foo"), Some(a));
        assert_eq!(repo.class_name(a).as_deref(), Some("Test:Foo"));

        let c = repo.intern_class("Test:Bar").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn mutations_from_foreign_thread_are_rejected() {
        let repo = Arc::new(repo());
        let remote = Arc::clone(&repo);
        let result = thread::spawn(move || remote.create_model("X", ModelKind::Spatial))
            .join()
            .unwrap();
        assert!(matches!(result, Err(StoreError::WrongThread { .. })));
    }

    #[test]
    fn unsafe_access_opt_in_admits_the_thread() {
        let repo = Arc::new(repo());
        let remote = Arc::clone(&repo);
        let result = thread::spawn(move || {
            remote.enable_unsafe_access()?;
            remote.create_model("X", ModelKind::Spatial)
        })
        .join()
        .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn second_cache_transaction_fails_while_active() {
        let repo = repo();
        let txn = repo.start_cache_transaction().unwrap();
        assert!(matches!(
            repo.start_cache_transaction(),
            Err(StoreError::TransactionActive)
        ));
        txn.commit().unwrap();
        // Idle again: a new transaction may start.
        let txn = repo.start_cache_transaction().unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn transaction_from_foreign_thread_is_rejected() {
        let repo = Arc::new(repo());
        let remote = Arc::clone(&repo);
        let result = thread::spawn(move || remote.start_cache_transaction().map(drop))
            .join()
            .unwrap();
        assert!(matches!(result, Err(StoreError::WrongThread { .. })));
    }
}
