//! Per-user serialization of cart and checkout mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ids::UserId;

type Registry = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Keyed async mutex registry. Operations on the same user run one at a time,
/// operations on different users never wait on each other. A user's entry
/// lives only while someone holds or waits for its lock.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    inner: Registry,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the user's lock. The guard releases it on drop.
    pub async fn acquire(&self, user_id: &UserId) -> UserLockGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(user_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        // Built before waiting, so a cancelled acquire still prunes its entry.
        let slot = Slot {
            registry: Arc::clone(&self.inner),
            user_id: user_id.clone(),
            lock,
        };
        let guard = Arc::clone(&slot.lock).lock_owned().await;
        UserLockGuard { _guard: guard, _slot: slot }
    }

    /// Number of users currently holding or waiting for a lock.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a user's lock until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UserLockGuard {
    // Field order matters: the mutex guard is released before the slot prunes.
    _guard: OwnedMutexGuard<()>,
    _slot: Slot,
}

/// One claim on a registry entry.
struct Slot {
    registry: Registry,
    user_id: UserId,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut map = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        // The map and this slot are the only owners left.
        let unused = map
            .get(&self.user_id)
            .is_some_and(|held| Arc::ptr_eq(held, &self.lock) && Arc::strong_count(held) == 2);
        if unused {
            map.remove(&self.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = UserLocks::new();
        let user = UserId::new("u-1");

        let guard = locks.acquire(&user).await;
        let contender = {
            let locks = locks.clone();
            let user = user.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&user).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.acquire(&UserId::new("a")).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&UserId::new("b")))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_pruned_after_release() {
        let locks = UserLocks::new();
        for i in 0..1_000 {
            let _guard = locks.acquire(&UserId::new(format!("user-{}", i))).await;
        }
        assert!(locks.is_empty());

        let user = UserId::new("u-1");
        let first = locks.acquire(&user).await;
        let waiter = {
            let locks = locks.clone();
            let user = user.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&user).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter keeps the entry alive after the holder lets go.
        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_is_pruned() {
        let locks = UserLocks::new();
        let user = UserId::new("u-1");
        let held = locks.acquire(&user).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(&user)).await;
        assert!(timed_out.is_err());

        drop(held);
        assert!(locks.is_empty());
    }
}
