use std::mem;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::repository::Repository;
use crate::store::RowOp;

enum TxnState {
    Idle,
    /// Writes arrived with no explicit transaction open; they journal
    /// into an implicit boundary committed by `save_changes`.
    Implicit(Vec<RowOp>),
    /// An explicit cache transaction owns the journal.
    Explicit(Vec<RowOp>),
}

/// Serializes the connection to one logical writer and journals row
/// mutations between boundaries. At most one explicit transaction is
/// live at a time; the journal's ops are eagerly applied by the
/// repository and replayed in reverse on rollback.
pub(crate) struct TransactionManager {
    state: Mutex<TxnState>,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            state: Mutex::new(TxnState::Idle),
        }
    }

    /// Open the explicit transaction. Any implicit journal pending at
    /// this point is handed back so the caller can commit it as its own
    /// boundary first.
    pub fn begin_explicit(&self) -> Result<Option<Vec<RowOp>>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("txn state"))?;
        match &mut *state {
            TxnState::Explicit(_) => Err(StoreError::TransactionActive),
            TxnState::Implicit(ops) => {
                let pending = mem::take(ops);
                *state = TxnState::Explicit(Vec::new());
                Ok(Some(pending))
            }
            TxnState::Idle => {
                *state = TxnState::Explicit(Vec::new());
                Ok(None)
            }
        }
    }

    /// Journal one applied op. Outside an explicit transaction the op
    /// extends (or opens) the implicit boundary.
    pub fn record(&self, op: RowOp) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("txn state"))?;
        match &mut *state {
            TxnState::Idle => {
                *state = TxnState::Implicit(vec![op]);
            }
            TxnState::Implicit(ops) | TxnState::Explicit(ops) => ops.push(op),
        }
        Ok(())
    }

    /// Close the explicit transaction and return its journal.
    pub fn end_explicit(&self) -> Result<Vec<RowOp>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("txn state"))?;
        match mem::replace(&mut *state, TxnState::Idle) {
            TxnState::Explicit(ops) => Ok(ops),
            other => {
                *state = other;
                Err(StoreError::NoTransaction)
            }
        }
    }

    /// Drain the implicit journal, if any. An open explicit transaction
    /// owns the boundary and refuses the drain.
    pub fn take_implicit(&self) -> Result<Vec<RowOp>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("txn state"))?;
        match mem::replace(&mut *state, TxnState::Idle) {
            TxnState::Implicit(ops) => Ok(ops),
            TxnState::Idle => Ok(Vec::new()),
            explicit @ TxnState::Explicit(_) => {
                *state = explicit;
                Err(StoreError::InvalidState(
                    "cache transaction owns the commit boundary",
                ))
            }
        }
    }

    pub fn is_explicit_active(&self) -> bool {
        matches!(
            self.state.lock().as_deref(),
            Ok(TxnState::Explicit(_))
        )
    }
}

/// Scoped handle over the connection's single live transaction.
///
/// Bound to the thread that started it; commits on scope exit unless
/// explicitly abandoned. The handle is the sole authority over the
/// underlying transaction — dropping it without calling [`abandon`]
/// commits, matching the "implicit commit on clean scope exit" contract.
///
/// [`abandon`]: CacheTransaction::abandon
pub struct CacheTransaction<'a> {
    repo: &'a Repository,
    done: bool,
}

impl<'a> CacheTransaction<'a> {
    pub(crate) fn new(repo: &'a Repository) -> Self {
        debug!("cache transaction started");
        CacheTransaction { repo, done: false }
    }

    /// Commit the transaction's journal as one boundary.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.done = true;
        self.repo.commit_explicit()
    }

    /// Roll back every row and range-index effect of this transaction.
    pub fn abandon(mut self) -> Result<(), StoreError> {
        self.done = true;
        debug!("cache transaction abandoned");
        self.repo.rollback_explicit()
    }
}

impl Drop for CacheTransaction<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(err) = self.repo.commit_explicit() {
            warn!(%err, "implicit commit on scope exit failed");
        }
    }
}
