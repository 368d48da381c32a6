//! Per-key mutual exclusion.
//!
//! Operations on one entitlement triple or one credential slot are
//! serialized; unrelated keys proceed in parallel. Entries are created on
//! first use and dropped again once nobody holds or waits for them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use devportal_core::DomainResult;

use crate::store::poisoned;

#[derive(Debug)]
pub struct KeyedLocks<K> {
    name: &'static str,
    entries: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// Not reentrant: calling `with` for the same key from inside `f`
    /// deadlocks.
    pub fn with<R>(&self, key: &K, f: impl FnOnce() -> DomainResult<R>) -> DomainResult<R> {
        let entry = {
            let mut entries = self.entries.lock().map_err(poisoned(self.name))?;
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        let result = {
            // The mutex guards no data, so a panic in an earlier holder
            // leaves nothing inconsistent behind.
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        self.release(key, &entry);
        result
    }

    /// Number of keys currently locked or waited on.
    pub fn active(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Threads holding or waiting for `key`.
    #[cfg(test)]
    pub(crate) fn contenders(&self, key: &K) -> usize {
        self.entries
            .lock()
            .map(|e| e.get(key).map_or(0, |entry| Arc::strong_count(entry) - 1))
            .unwrap_or(0)
    }

    fn release(&self, key: &K, entry: &Arc<Mutex<()>>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        // One reference in the map plus ours: no other thread can reach it,
        // since new references are only handed out under the map lock.
        let unused = entries
            .get(key)
            .is_some_and(|e| Arc::ptr_eq(e, entry) && Arc::strong_count(e) == 2);
        if unused {
            entries.remove(key);
        }
    }
}
