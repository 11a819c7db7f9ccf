use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use ledgr_common::inventory::DeviceId;

/// What a reconciliation needs exclusive access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Device(DeviceId),
    Ip(IpAddr),
}

/// A table of async mutexes created on demand, one per key.
///
/// Slots nobody holds or waits for are dropped on the next acquisition, so the table only grows
/// with the amount of concurrent work, not with the size of the inventory.
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Holds every lock taken by one [`KeyedLocks::lock_all`] call until dropped.
pub struct KeyedGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl<K: Ord + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires all `keys`, always in ascending order, so that two callers sharing any subset of
    /// keys cannot deadlock.
    pub async fn lock_all(&self, keys: impl IntoIterator<Item = K>) -> KeyedGuard {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let slots: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            keys.into_iter()
                .map(|key| Arc::clone(table.entry(key).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        KeyedGuard { _guards: guards }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Ord + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shared_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let guard = locks.lock_all([1, 2]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock_all([2, 3]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_block() {
        let locks = KeyedLocks::<u32>::new();
        let _a = locks.lock_all([1]).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock_all([2])).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = KeyedLocks::<u32>::new();
        drop(locks.lock_all([1, 2, 3]).await);
        assert_eq!(locks.len(), 3);

        let _held = locks.lock_all([4]).await;
        assert_eq!(locks.len(), 1);
    }
}
