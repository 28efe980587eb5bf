//! Per-fingerprint locks.
//!
//! Two renders of the same source into the same directory share a staged
//! path and artifact names. [`FingerprintLocks`] hands out one async mutex
//! per staged path so those renders run one after another, while different
//! sources proceed in parallel. Entries are held weakly and pruned as guards
//! drop out.
//!
//! Engines use the process-wide table from [`FingerprintLocks::shared`], so
//! one-off engines built by [`crate::render::render`] still serialise with
//! each other.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// Guard held for the lifetime of one render.
pub type FingerprintGuard = OwnedMutexGuard<()>;

static SHARED: Lazy<Arc<FingerprintLocks>> = Lazy::new(|| Arc::new(FingerprintLocks::new()));

#[derive(Debug, Default)]
pub struct FingerprintLocks {
    entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shared by every engine in the process.
    pub fn shared() -> Arc<FingerprintLocks> {
        Arc::clone(&SHARED)
    }

    /// Wait until no other render holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> FingerprintGuard {
        let lock = self.entry(key);
        lock.lock_owned().await
    }

    /// Number of fingerprints with a live lock.
    pub fn active(&self) -> usize {
        let entries = self.entries();
        entries.values().filter(|w| w.strong_count() > 0).count()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries();
        entries.retain(|_, w| w.strong_count() > 0);
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        entries.insert(key.to_string(), Arc::downgrade(&lock));
        lock
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Weak<AsyncMutex<()>>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned fingerprint lock table"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_fingerprint_is_exclusive() {
        let locks = FingerprintLocks::new();
        let guard = locks.acquire("abc").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("abc")).await;
        assert!(second.is_err(), "second acquire should wait");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_secs(1), locks.acquire("abc")).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_fingerprints_do_not_block() {
        let locks = FingerprintLocks::new();
        let _a = locks.acquire("aaa").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("bbb")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn shared_table_is_one_table() {
        let key = "/tmp/shared-table-test/abc";
        let guard = FingerprintLocks::shared().acquire(key).await;
        let other = FingerprintLocks::shared();
        let second = tokio::time::timeout(Duration::from_millis(50), other.acquire(key)).await;
        assert!(second.is_err(), "second handle should see the held lock");
        drop(guard);
    }

    #[test]
    fn entries_are_pruned_after_release() {
        let locks = FingerprintLocks::new();
        tokio_test::block_on(async {
            let guard = locks.acquire("abc").await;
            assert_eq!(locks.active(), 1);
            drop(guard);
        });
        assert_eq!(locks.active(), 0);
    }
}
