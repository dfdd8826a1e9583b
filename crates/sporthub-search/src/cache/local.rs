//! Tier-1 cache: bounded in-process LRU with per-entry expiry.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded LRU whose entries expire `ttl` after insertion.
///
/// The lock is held only for map operations, never across an await.
pub struct LocalCache<V> {
    entries: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> LocalCache<V> {
    /// Cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry<V>>> {
        // Entries are plain data; a panic elsewhere cannot leave them inconsistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live value for `key`, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Stores `value`, evicting the least recently used entry when full.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().put(key.into(), entry);
    }

    /// Removes `key` if present.
    pub fn remove(&self, key: &str) {
        self.lock().pop(key);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
