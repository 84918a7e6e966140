//! Per-tree write locks
//!
//! Every mutation holds its tree's lock for the whole transaction, so two
//! coordinate shifts on the same tree can never interleave. Each `TreeKind`
//! has its own mutex: a menu mutation and a taxonomy mutation never wait on
//! each other.
//!
//! Acquisition is bounded by a timeout. A caller that cannot get the lock in
//! time receives `TreeError::TreeBusy` and nothing has been written.

use crate::error::{TreeError, TreeResult};
use crate::models::TreeKind;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held for the duration of one mutation
#[derive(Debug)]
pub struct TreeLockGuard {
    kind: TreeKind,
    _guard: OwnedMutexGuard<()>,
}

impl TreeLockGuard {
    pub fn kind(&self) -> TreeKind {
        self.kind
    }
}

/// One async mutex per tree kind
#[derive(Debug, Clone)]
pub struct TreeLocks {
    locks: Arc<HashMap<TreeKind, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl TreeLocks {
    pub fn new(timeout: Duration) -> Self {
        let locks = TreeKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            locks: Arc::new(locks),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the write lock of `kind`, waiting at most the configured timeout
    pub async fn acquire(&self, kind: TreeKind) -> TreeResult<TreeLockGuard> {
        let waited_ms = self.timeout.as_millis() as u64;
        let mutex = self
            .locks
            .get(&kind)
            .cloned()
            .ok_or_else(|| TreeError::tree_busy(kind, 0))?;

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                tracing::debug!("Acquired {} tree lock", kind);
                Ok(TreeLockGuard {
                    kind,
                    _guard: guard,
                })
            }
            Err(_) => {
                tracing::warn!("Timed out after {} ms waiting for {} tree lock", waited_ms, kind);
                Err(TreeError::tree_busy(kind, waited_ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_tree_lock_times_out() {
        let locks = TreeLocks::new(Duration::from_millis(20));
        let _held = locks.acquire(TreeKind::Menu).await.unwrap();

        let err = locks.acquire(TreeKind::Menu).await.unwrap_err();
        assert!(matches!(
            err,
            TreeError::TreeBusy {
                kind: TreeKind::Menu,
                waited_ms: 20
            }
        ));
    }

    #[tokio::test]
    async fn test_different_trees_do_not_block() {
        let locks = TreeLocks::new(Duration::from_millis(20));
        let menu = locks.acquire(TreeKind::Menu).await.unwrap();
        let taxonomy = locks.acquire(TreeKind::Taxonomy).await.unwrap();
        assert_eq!(menu.kind(), TreeKind::Menu);
        assert_eq!(taxonomy.kind(), TreeKind::Taxonomy);
    }

    #[tokio::test]
    async fn test_lock_is_released_on_drop() {
        let locks = TreeLocks::new(Duration::from_millis(20));
        drop(locks.acquire(TreeKind::Organization).await.unwrap());
        assert!(locks.acquire(TreeKind::Organization).await.is_ok());
    }
}
