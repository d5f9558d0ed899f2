use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Student(UserId),
    Alumni(UserId),
}

/// Async mutual exclusion per key. Callers that need both kinds take the
/// student lock first.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn acquire(&self, key: LockKey) -> KeyGuard {
        let lock = Arc::clone(&self.locks.entry(key).or_default());
        let mut held = KeyGuard { key, locks: Arc::clone(&self.locks), guard: None };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Holds one key. The map entry goes away with the last holder or waiter.
pub(crate) struct KeyGuard {
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        // waiters hold a clone, so a count of one means only the map is left
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_waits() {
        let locks = KeyedLocks::default();
        let held = locks.acquire(LockKey::Student(1)).await;

        let waiting = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(LockKey::Student(1)),
        )
        .await;
        assert!(waiting.is_err());

        drop(held);
        let _again = locks.acquire(LockKey::Student(1)).await;
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::default();
        let _student = locks.acquire(LockKey::Student(1)).await;

        let other = tokio::time::timeout(Duration::from_millis(50), async {
            let _a = locks.acquire(LockKey::Student(2)).await;
            let _b = locks.acquire(LockKey::Alumni(1)).await;
        })
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let locks = KeyedLocks::default();
        let held = locks.acquire(LockKey::Student(1)).await;

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move {
                let _next = locks.acquire(LockKey::Student(1)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);

        for id in 0..100 {
            let _student = locks.acquire(LockKey::Student(id)).await;
            let _alumni = locks.acquire(LockKey::Alumni(id)).await;
        }
        assert_eq!(locks.len(), 0);
    }
}
