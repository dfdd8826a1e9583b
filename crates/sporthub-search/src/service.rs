//! Search read path: the cache cascade in front of the index.
//!
//! Lookups try the local tier, then the shared tier, then the index. A shared
//! hit back-fills the local tier; an index result populates both with the
//! same TTL. Cache failures are logged and treated as misses, so the index
//! stays the source of truth.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sporthub_core::error::DomainError;
use sporthub_core::search::{SearchDocument, SearchIndex, SearchQuery, SearchResult};
use tracing::{debug, instrument, warn};

use crate::cache::{LocalCache, SharedCache};

/// Evicts cached entries after the index changes.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Removes `key` from every cache tier.
    async fn invalidate(&self, key: &str);
}

/// Cached query and document lookups over a [`SearchIndex`].
pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    local: LocalCache<String>,
    shared: Arc<dyn SharedCache>,
    ttl: Duration,
}

impl SearchService {
    /// Builds the service. Both tiers use `ttl`; the local tier holds at most
    /// `local_capacity` entries.
    #[must_use]
    pub fn new(
        index: Arc<dyn SearchIndex>,
        shared: Arc<dyn SharedCache>,
        local_capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            index,
            local: LocalCache::new(local_capacity, ttl),
            shared,
            ttl,
        }
    }

    /// Runs a query through the cascade.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a malformed query, or
    /// `DomainError::Infrastructure` if the index fails on a cache miss.
    #[instrument(skip(self), fields(text = %query.text, page = query.page))]
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResult, DomainError> {
        let query = query.normalized()?;
        let key = query.cache_key();
        if let Some(hit) = self.lookup::<SearchResult>(&key).await {
            return Ok(hit);
        }

        let result = self.index.search(&query).await?;
        debug!(key = %key, total = result.total, "index search");
        self.populate(&key, &result).await;
        Ok(result)
    }

    /// Loads one document through the cascade, keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blank id,
    /// `DomainError::NotFound` if the index has no such document.
    pub async fn get_document(&self, id: &str) -> Result<SearchDocument, DomainError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DomainError::Validation("document id is required".to_owned()));
        }
        if let Some(hit) = self.lookup::<SearchDocument>(id).await {
            return Ok(hit);
        }

        let doc = self
            .index
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("document", id))?;
        self.populate(id, &doc).await;
        Ok(doc)
    }

    /// Evicts `key` from both tiers.
    pub async fn bust(&self, key: &str) {
        self.local.remove(key);
        if let Err(err) = self.shared.delete(key).await {
            warn!(key, error = %err, "shared cache eviction failed");
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(raw) = self.local.get(key) {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, tier = "local", "cache hit");
                    return Some(value);
                }
                Err(err) => {
                    warn!(key, error = %err, "dropping undecodable local cache entry");
                    self.local.remove(key);
                }
            }
        }

        match self.shared.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, tier = "shared", "cache hit");
                    self.local.insert(key, raw);
                    Some(value)
                }
                Err(err) => {
                    warn!(key, error = %err, "ignoring undecodable shared cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, error = %err, "shared cache read failed");
                None
            }
        }
    }

    async fn populate<T: Serialize + Sync>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "skipping cache fill: serialization failed");
                return;
            }
        };
        if let Err(err) = self.shared.set(key, &raw, self.ttl).await {
            warn!(key, error = %err, "shared cache write failed");
        }
        self.local.insert(key, raw);
    }
}

#[async_trait]
impl CacheInvalidator for SearchService {
    async fn invalidate(&self, key: &str) {
        self.bust(key).await;
    }
}

#[cfg(test)]
mod tests {
    use sporthub_core::search::SearchQuery;
    use sporthub_test_support::{FailingSearchIndex, InMemorySearchIndex, sample_document};

    use super::*;
    use crate::cache::{CacheError, InMemorySharedCache};

    struct BrokenSharedCache;

    #[async_trait]
    impl SharedCache for BrokenSharedCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Connection("refused".to_owned()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".to_owned()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".to_owned()))
        }
    }

    fn service(index: Arc<InMemorySearchIndex>, shared: Arc<dyn SharedCache>) -> SearchService {
        SearchService::new(index, shared, 100, Duration::from_secs(60))
    }

    fn query(text: &str) -> SearchQuery {
        SearchQuery {
            text: text.to_owned(),
            ..SearchQuery::default()
        }
    }

    #[tokio::test]
    async fn test_identical_searches_hit_the_index_once() {
        // Arrange
        let index = Arc::new(
            InMemorySearchIndex::new().with_document(sample_document("1", "Futbol 5")),
        );
        let svc = service(Arc::clone(&index), Arc::new(InMemorySharedCache::new()));

        // Act
        let first = svc.search(query("futbol")).await.unwrap();
        let second = svc.search(query("  FUTBOL ")).await.unwrap();

        // Assert
        assert_eq!(index.search_calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.total, 1);
    }

    #[tokio::test]
    async fn test_shared_tier_hit_skips_the_index() {
        // Arrange
        let index = Arc::new(
            InMemorySearchIndex::new().with_document(sample_document("1", "Futbol 5")),
        );
        let shared: Arc<dyn SharedCache> = Arc::new(InMemorySharedCache::new());
        let warm = service(Arc::clone(&index), Arc::clone(&shared));
        warm.search(query("futbol")).await.unwrap();

        // A second process shares tier 2 but starts with an empty tier 1.
        let cold = service(Arc::clone(&index), shared);

        // Act
        let result = cold.search(query("futbol")).await.unwrap();

        // Assert
        assert_eq!(index.search_calls(), 1);
        assert_eq!(result.docs[0].id, "1");
    }

    #[tokio::test]
    async fn test_shared_tier_failure_falls_through_to_index() {
        // Arrange
        let index = Arc::new(
            InMemorySearchIndex::new().with_document(sample_document("1", "Futbol 5")),
        );
        let svc = service(Arc::clone(&index), Arc::new(BrokenSharedCache));

        // Act
        let result = svc.search(query("futbol")).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(index.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_index_failure_surfaces_as_infrastructure_error() {
        let svc = SearchService::new(
            Arc::new(FailingSearchIndex),
            Arc::new(InMemorySharedCache::new()),
            10,
            Duration::from_secs(60),
        );

        let result = svc.search(query("futbol")).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_invalid_query_is_rejected_before_the_index() {
        let index = Arc::new(InMemorySearchIndex::new());
        let svc = service(Arc::clone(&index), Arc::new(InMemorySharedCache::new()));

        let result = svc
            .search(SearchQuery {
                size: 0,
                ..SearchQuery::default()
            })
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(index.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_document_is_cached_until_busted() {
        // Arrange
        let index = Arc::new(
            InMemorySearchIndex::new().with_document(sample_document("42", "Yoga")),
        );
        let svc = service(Arc::clone(&index), Arc::new(InMemorySharedCache::new()));
        svc.get_document("42").await.unwrap();
        svc.get_document("42").await.unwrap();
        assert_eq!(index.get_calls(), 1);

        // Act
        svc.invalidate("42").await;
        svc.get_document("42").await.unwrap();

        // Assert
        assert_eq!(index.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let svc = service(
            Arc::new(InMemorySearchIndex::new()),
            Arc::new(InMemorySharedCache::new()),
        );

        let result = svc.get_document("nope").await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "document",
                ..
            })
        ));
    }
}
