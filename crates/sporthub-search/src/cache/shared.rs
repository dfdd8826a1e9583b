//! Tier-2 cache shared between search processes.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;

/// Failure talking to the shared cache. Callers treat it as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not reach the cache server.
    #[error("cache connection failed: {0}")]
    Connection(String),
    /// The cache rejected a command.
    #[error("cache command failed: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// A key/value cache with per-entry expiry, shared across processes.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`; removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis-backed shared cache; values expire through `SET EX`.
#[derive(Clone)]
pub struct RedisSharedCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSharedCache {
    /// Connects to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            prefix: "sporthub:search:".to_owned(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl SharedCache for RedisSharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(self.key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(self.key(key), value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.key(key)).await?;
        Ok(())
    }
}

/// Default entry bound of [`InMemorySharedCache`].
pub const DEFAULT_SHARED_CAPACITY: usize = 10_000;

/// Shared tier used when no Redis is configured: a bounded TTL map private
/// to the process.
///
/// Expired entries are swept before any live entry is evicted, so a full
/// cache drops the least recently used live entry only when nothing has
/// expired.
#[derive(Debug)]
pub struct InMemorySharedCache {
    entries: Mutex<LruCache<String, (String, Instant)>>,
}

impl Default for InMemorySharedCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SHARED_CAPACITY)
    }
}

impl InMemorySharedCache {
    /// Creates an empty cache holding at most [`DEFAULT_SHARED_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, expired ones not yet swept included.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, CacheError> {
        self.with_entries(|entries| entries.len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Backend` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut LruCache<String, (String, Instant)>) -> T,
    ) -> Result<T, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("in-memory cache lock poisoned".to_owned()))?;
        Ok(f(&mut entries))
    }
}

fn sweep_expired(entries: &mut LruCache<String, (String, Instant)>, now: Instant) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, (_, expires_at))| *expires_at <= now)
        .map(|(key, _)| key.clone())
        .collect();
    for key in expired {
        entries.pop(&key);
    }
}

#[async_trait]
impl SharedCache for InMemorySharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_entries(|entries| {
            let live = entries
                .get(key)
                .filter(|(_, expires_at)| *expires_at > Instant::now())
                .map(|(value, _)| value.clone());
            if live.is_none() {
                entries.pop(key);
            }
            live
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.with_entries(|entries| {
            if ttl.is_zero() {
                entries.pop(key);
                return;
            }
            let now = Instant::now();
            if entries.len() == entries.cap().get() && !entries.contains(key) {
                sweep_expired(entries, now);
            }
            entries.put(key.to_owned(), (value.to_owned(), now + ttl));
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.with_entries(|entries| {
            entries.pop(key);
        })
    }
}
