use std::collections::HashSet;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::error::StoreError;

/// Owner-thread token for a connection, captured at open time.
///
/// Transaction-starting and mutating entry points call [`check`] before
/// touching any state; a mismatch is a typed error, not an assertion, so
/// the contract holds identically in every build profile. Callers that
/// accept the risk can whitelist additional threads — per connection,
/// never process-wide.
///
/// [`check`]: AccessGuard::check
pub(crate) struct AccessGuard {
    owner: ThreadId,
    unsafe_threads: Mutex<HashSet<ThreadId>>,
}

impl AccessGuard {
    pub fn new() -> Self {
        AccessGuard {
            owner: thread::current().id(),
            unsafe_threads: Mutex::new(HashSet::new()),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn check(&self) -> Result<(), StoreError> {
        let caller = thread::current().id();
        if caller == self.owner {
            return Ok(());
        }
        let whitelisted = self
            .unsafe_threads
            .lock()
            .map_err(|_| StoreError::LockPoisoned("unsafe-access set"))?
            .contains(&caller);
        if whitelisted {
            Ok(())
        } else {
            Err(StoreError::WrongThread {
                owner: self.owner,
                caller,
            })
        }
    }

    /// Whitelist the calling thread for access on this connection.
    pub fn enable_unsafe_access(&self) -> Result<(), StoreError> {
        self.unsafe_threads
            .lock()
            .map_err(|_| StoreError::LockPoisoned("unsafe-access set"))?
            .insert(thread::current().id());
        Ok(())
    }

    /// Revoke the calling thread's whitelist entry.
    pub fn disable_unsafe_access(&self) -> Result<(), StoreError> {
        self.unsafe_threads
            .lock()
            .map_err(|_| StoreError::LockPoisoned("unsafe-access set"))?
            .remove(&thread::current().id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn owner_thread_passes() {
        let guard = AccessGuard::new();
        assert!(guard.check().is_ok());
    }

    #[test]
    fn foreign_thread_is_rejected() {
        let guard = Arc::new(AccessGuard::new());
        let remote = Arc::clone(&guard);
        let result = thread::spawn(move || remote.check()).join().unwrap();
        assert!(matches!(result, Err(StoreError::WrongThread { .. })));
    }

    #[test]
    fn unsafe_access_whitelists_only_the_enabling_thread() {
        let guard = Arc::new(AccessGuard::new());

        let remote = Arc::clone(&guard);
        let result = thread::spawn(move || {
            remote.enable_unsafe_access().unwrap();
            remote.check()
        })
        .join()
        .unwrap();
        assert!(result.is_ok());

        // A different foreign thread is still rejected.
        let remote = Arc::clone(&guard);
        let result = thread::spawn(move || remote.check()).join().unwrap();
        assert!(matches!(result, Err(StoreError::WrongThread { .. })));
    }

    #[test]
    fn disable_revokes_the_whitelist() {
        let guard = Arc::new(AccessGuard::new());
        let remote = Arc::clone(&guard);
        let result = thread::spawn(move || {
            remote.enable_unsafe_access().unwrap();
            assert!(remote.check().is_ok());
            remote.disable_unsafe_access().unwrap();
            remote.check()
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(StoreError::WrongThread { .. })));
    }
}
