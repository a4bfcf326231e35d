use std::fmt;
use std::path::PathBuf;
use std::thread::ThreadId;

use crate::id::{ElementId, ModelId};

#[derive(Debug)]
pub enum StoreError {
    /// A transaction-starting or mutating call arrived on a thread other
    /// than the connection's access thread, without unsafe access enabled.
    WrongThread {
        owner: ThreadId,
        caller: ThreadId,
    },
    /// A second cache transaction was started while one is live.
    TransactionActive,
    /// A write arrived with no transaction open to journal it.
    NoTransaction,
    /// A lifecycle call arrived in a state that cannot honor it, e.g.
    /// starting a revision while one is already accumulating.
    InvalidState(&'static str),
    LockPoisoned(&'static str),
    ElementNotFound(ElementId),
    DuplicateElement(ElementId),
    ModelNotFound(ModelId),
    /// Models may only be deleted once empty of elements.
    ModelNotEmpty(ModelId),
    /// The range index has no aggregate range to report (absent tree or
    /// no surviving entries).
    RangeUnavailable,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Changeset encode/decode failure, including format-version mismatch.
    Codec(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::WrongThread { owner, caller } => write!(
                f,
                "access from thread {caller:?} but connection is owned by {owner:?}"
            ),
            StoreError::TransactionActive => {
                write!(f, "a cache transaction is already active on this connection")
            }
            StoreError::NoTransaction => {
                write!(f, "no transaction is open on this connection")
            }
            StoreError::InvalidState(what) => write!(f, "invalid state: {what}"),
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {operation}")
            }
            StoreError::ElementNotFound(id) => write!(f, "element {id} not found"),
            StoreError::DuplicateElement(id) => write!(f, "element {id} already exists"),
            StoreError::ModelNotFound(id) => write!(f, "model {id} not found"),
            StoreError::ModelNotEmpty(id) => {
                write!(f, "model {id} still contains elements")
            }
            StoreError::RangeUnavailable => {
                write!(f, "range index has no aggregate range")
            }
            StoreError::Io { path, source } => {
                write!(f, "i/o failure on {}: {source}", path.display())
            }
            StoreError::Codec(message) => write!(f, "changeset codec failure: {message}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
