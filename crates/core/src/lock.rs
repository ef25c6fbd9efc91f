//! Keyed async locks.
//!
//! A [`LockTable`] hands out one `tokio` mutex per key and forgets the key
//! once nobody holds or waits for it. The registry keeps one table for
//! locator strings and one for the directories loaders write into.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::MutexGuard;

type KeyMutex = Arc<tokio::sync::Mutex<()>>;

/// Table of async mutexes keyed by string.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<String, KeyMutex>>,
}

impl LockTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the lock for `key`.
    ///
    /// The returned handle keeps the key in the table until it is dropped,
    /// whether or not [`KeyLock::acquire`] completed.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> KeyLock<'_> {
        let key = key.into();
        let mutex = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        KeyLock {
            table: self,
            key,
            mutex,
        }
    }

    /// Number of keys currently reserved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no key is reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reservation of one key in a [`LockTable`].
#[derive(Debug)]
pub struct KeyLock<'a> {
    table: &'a LockTable,
    key: String,
    mutex: KeyMutex,
}

impl KeyLock<'_> {
    /// Wait until no other holder of this key is active.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        let mut entries = self
            .table
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the table, one here: nobody else holds the key.
        if entries
            .get(&self.key)
            .is_some_and(|mutex| Arc::ptr_eq(mutex, &self.mutex) && Arc::strong_count(mutex) == 2)
        {
            entries.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn hold(table: &LockTable, active: &AtomicUsize, max_active: &AtomicUsize) {
        let lock = table.key("dir");
        let _held = lock.acquire().await;
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        active.fetch_sub(1, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let table = LockTable::new();
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        tokio::join!(
            hold(&table, &active, &max_active),
            hold(&table, &active, &max_active),
            hold(&table, &active, &max_active),
        );

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let table = LockTable::new();
        let a = table.key("a");
        let _a = a.acquire().await;

        let b = table.key("b");
        let acquired = tokio::time::timeout(Duration::from_millis(50), b.acquire()).await;
        assert!(acquired.is_ok());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_releases_key() {
        let table = LockTable::new();
        let holder = table.key("dir");
        let held = holder.acquire().await;

        let waited = tokio::time::timeout(Duration::from_millis(20), async {
            let lock = table.key("dir");
            let _held = lock.acquire().await;
        })
        .await;
        assert!(waited.is_err());
        assert_eq!(table.len(), 1);

        drop(held);
        drop(holder);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_holder_releases_key() {
        let table = LockTable::new();
        let cancelled = tokio::time::timeout(Duration::from_millis(20), async {
            let lock = table.key("dir");
            let _held = lock.acquire().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        assert!(cancelled.is_err());
        assert!(table.is_empty());
    }
}
