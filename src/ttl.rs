//! Generic expiring-entry map.
//!
//! Every time-windowed piece of engine state (debounce, recently-released,
//! recently-allowed, single-print bypass, the polling source's seen-set)
//! is one of these. Entries expire lazily on lookup and eagerly on
//! [`ExpiringMap::sweep`], so sweeps are idempotent and safe to run at any
//! time.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Map from key to expiry instant. Not internally synchronized; callers
/// keep it behind their own lock.
#[derive(Debug, Default)]
pub struct ExpiringMap<K> {
    entries: HashMap<K, Instant>,
}

impl<K: Eq + Hash> ExpiringMap<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert or refresh an entry expiring `ttl` from now.
    pub fn insert(&mut self, key: K, ttl: Duration) {
        self.entries.insert(key, Instant::now() + ttl);
    }

    /// True if the key is present and not yet expired.
    pub fn contains_live(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|expiry| Instant::now() < *expiry)
    }

    /// One-shot take: removes the entry and reports whether it was still
    /// live. A stale entry is removed but reported as absent.
    pub fn consume(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(expiry) => Instant::now() < expiry,
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expiry| now < *expiry);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
