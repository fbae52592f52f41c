//! Per-repository operation locks

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::FlowError;
use crate::session::RepoId;

/// Tracks which repositories have an operation in flight
///
/// Cloning shares the underlying set.
#[derive(Debug, Default, Clone)]
pub struct OperationLocks {
    held: Arc<Mutex<HashSet<RepoId>>>,
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`; fails with [`FlowError::Busy`] while another guard is alive
    pub fn acquire(&self, id: &RepoId) -> Result<OperationGuard, FlowError> {
        let mut held = lock(&self.held);
        if !held.insert(id.clone()) {
            return Err(FlowError::Busy(id.full_name()));
        }
        debug!(repo = %id, "Operation lock acquired");

        Ok(OperationGuard {
            held: Arc::clone(&self.held),
            id: id.clone(),
        })
    }

    pub fn is_locked(&self, id: &RepoId) -> bool {
        lock(&self.held).contains(id)
    }
}

/// Releases its repository when dropped
#[derive(Debug)]
pub struct OperationGuard {
    held: Arc<Mutex<HashSet<RepoId>>>,
    id: RepoId,
}

impl OperationGuard {
    pub fn repo(&self) -> &RepoId {
        &self.id
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        lock(&self.held).remove(&self.id);
        debug!(repo = %self.id, "Operation lock released");
    }
}

// A panic while holding the set cannot leave it inconsistent
fn lock(held: &Mutex<HashSet<RepoId>>) -> MutexGuard<'_, HashSet<RepoId>> {
    held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let locks = OperationLocks::new();
        let id = RepoId::new("o", "demo");

        let guard = locks.acquire(&id).unwrap();
        assert!(locks.is_locked(&id));
        assert!(matches!(locks.acquire(&id), Err(FlowError::Busy(_))));

        drop(guard);
        assert!(!locks.is_locked(&id));
        assert!(locks.acquire(&id).is_ok());
    }

    #[test]
    fn test_locks_are_per_repository() {
        let locks = OperationLocks::new();
        let _a = locks.acquire(&RepoId::new("o", "a")).unwrap();
        assert!(locks.acquire(&RepoId::new("o", "b")).is_ok());
    }

    #[test]
    fn test_clones_share_state() {
        let locks = OperationLocks::new();
        let shared = locks.clone();
        let id = RepoId::new("o", "demo");

        let _guard = locks.acquire(&id).unwrap();
        assert!(shared.is_locked(&id));
    }
}
