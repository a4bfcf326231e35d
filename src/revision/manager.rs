use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::DbRole;
use crate::error::StoreError;

use super::{ChangeRecord, ChangeSetFile, RevisionId};

/// Outcome of `start_create_revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionStart {
    /// A draft is now accumulating transaction boundaries.
    Started,
    /// This database is the canonical master copy; it never produces
    /// revisions, and the call was a no-op.
    MasterCopy,
}

/// A finished, durable revision. Immutable once created: the manager
/// hands out `Arc`s and exposes no mutating API, so the record's content
/// is fixed the moment `finish_create_revision` returns.
#[derive(Debug)]
pub struct Revision {
    id: RevisionId,
    parent: Option<RevisionId>,
    records: Vec<ChangeRecord>,
    file: Option<PathBuf>,
}

impl Revision {
    pub fn id(&self) -> RevisionId {
        self.id
    }

    /// The revision this one's span began after, `None` for the first.
    pub fn parent(&self) -> Option<RevisionId> {
        self.parent
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Companion file the changeset was written to, when a revision
    /// directory is configured.
    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }
}

struct RevisionLog {
    /// Boundaries committed since the last finished or abandoned draft.
    pending: Vec<ChangeRecord>,
    /// Records captured by an open `start_create_revision` span.
    draft: Option<Vec<ChangeRecord>>,
    log: Vec<Arc<Revision>>,
    next: u64,
}

/// Produces the ordered, append-only log of revisions for one database.
///
/// The state machine is None → Accumulating → (finish | abandon) → None.
/// A master-copy database short-circuits every cycle: it is the root
/// replica and has nothing to synchronize against.
pub(crate) struct RevisionManager {
    role: DbRole,
    dir: Option<PathBuf>,
    state: Mutex<RevisionLog>,
}

impl RevisionManager {
    pub fn new(role: DbRole, dir: Option<PathBuf>) -> Self {
        RevisionManager {
            role,
            dir,
            state: Mutex::new(RevisionLog {
                pending: Vec::new(),
                draft: None,
                log: Vec::new(),
                next: 1,
            }),
        }
    }

    /// Record one committed transaction boundary. On a master copy the
    /// records are discarded — nothing downstream will ever read them.
    pub fn record_boundary(&self, records: Vec<ChangeRecord>) -> Result<(), StoreError> {
        if self.role == DbRole::Master || records.is_empty() {
            return Ok(());
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        match &mut state.draft {
            Some(draft) => draft.extend(records),
            None => state.pending.extend(records),
        }
        Ok(())
    }

    pub fn start_create_revision(&self) -> Result<RevisionStart, StoreError> {
        if self.role == DbRole::Master {
            return Ok(RevisionStart::MasterCopy);
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        if state.draft.is_some() {
            return Err(StoreError::InvalidState("a revision is already being created"));
        }
        let pending = mem::take(&mut state.pending);
        debug!(captured = pending.len(), "revision draft opened");
        state.draft = Some(pending);
        Ok(RevisionStart::Started)
    }

    /// Seal the open draft into a durable, immutable revision.
    pub fn finish_create_revision(&self) -> Result<Arc<Revision>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        let Some(records) = state.draft.take() else {
            return Err(StoreError::InvalidState("no revision is being created"));
        };

        let id = RevisionId::new(state.next);
        let parent = state.log.last().map(|r| r.id());

        let file = match &self.dir {
            Some(dir) => {
                let path = dir.join(format!("{id}.changeset"));
                ChangeSetFile::new(id, parent, records.clone()).write_to(&path)?;
                Some(path)
            }
            None => None,
        };

        let revision = Arc::new(Revision {
            id,
            parent,
            records,
            file,
        });
        state.next += 1;
        state.log.push(Arc::clone(&revision));
        debug!(%id, records = revision.records().len(), "revision finished");
        Ok(revision)
    }

    /// Discard the open draft. Leaves no trace in the log; the next
    /// revision cycle starts from the boundaries committed after this
    /// call.
    pub fn abandon_create_revision(&self) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        let Some(draft) = state.draft.take() else {
            return Err(StoreError::InvalidState("no revision is being created"));
        };
        debug!(discarded = draft.len(), "revision draft abandoned");
        Ok(())
    }

    pub fn revisions(&self) -> Result<Vec<Arc<Revision>>, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        Ok(state.log.clone())
    }

    /// Whether boundaries are waiting for the next revision cycle.
    pub fn has_pending_changes(&self) -> Result<bool, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("revision state"))?;
        Ok(!state.pending.is_empty() || state.draft.as_ref().is_some_and(|d| !d.is_empty()))
    }
}
