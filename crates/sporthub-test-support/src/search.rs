//! Search index and document source fakes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use sporthub_core::search::{
    DocumentSource, IndexError, SearchDocument, SearchIndex, SearchQuery, SearchResult,
    SourceError,
};

/// A minimal search document for activity `id`.
///
/// # Panics
///
/// Never; the timestamps are valid.
#[must_use]
pub fn sample_document(id: &str, name: &str) -> SearchDocument {
    SearchDocument {
        id: id.to_owned(),
        activity_id: id.to_owned(),
        session_id: String::new(),
        name: name.to_owned(),
        category: "football".to_owned(),
        location: "Club Norte".to_owned(),
        instructor: String::new(),
        start_at: Some(Utc.with_ymd_and_hms(2026, 2, 1, 19, 0, 0).unwrap()),
        end_at: Some(Utc.with_ymd_and_hms(2026, 2, 1, 20, 0, 0).unwrap()),
        difficulty: 1,
        price: 100.0,
        tags: Vec::new(),
        updated_at: Some(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
    }
}

/// Index held in a `BTreeMap`, counting the calls it receives.
///
/// Search matches `text` as a substring of the lowercased name, filters
/// category and location exactly, keeps documents starting on or after `date`,
/// and orders by id.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    docs: Mutex<BTreeMap<String, SearchDocument>>,
    searches: AtomicUsize,
    gets: AtomicUsize,
}

impl InMemorySearchIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `doc`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_document(self, doc: SearchDocument) -> Self {
        self.docs.lock().unwrap().insert(doc.id.clone(), doc);
        self
    }

    /// Returns the stored document with `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn document(&self, id: &str) -> Option<SearchDocument> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    /// Number of `search` calls so far.
    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of `get` calls so far.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

fn matches_query(doc: &SearchDocument, query: &SearchQuery) -> bool {
    if !query.text.is_empty() && !doc.name.to_lowercase().contains(&query.text) {
        return false;
    }
    if !query.category.is_empty() && doc.category != query.category {
        return false;
    }
    if !query.location.is_empty() && doc.location != query.location {
        return false;
    }
    if let Ok(from) = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d") {
        return doc.start_at.is_some_and(|start| start.date_naive() >= from);
    }
    true
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.lock().unwrap();
        let matching: Vec<&SearchDocument> =
            docs.values().filter(|d| matches_query(d, query)).collect();
        let page = matching
            .iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.size as usize)
            .map(|d| (*d).clone())
            .collect();
        Ok(SearchResult {
            total: matching.len() as u64,
            page: query.page,
            size: query.size,
            docs: page,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<SearchDocument>, IndexError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.lock().unwrap().get(id).cloned())
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError> {
        self.docs
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        self.docs.lock().unwrap().remove(id);
        Ok(())
    }
}

/// An index whose every call fails, as if the search engine were down.
#[derive(Debug)]
pub struct FailingSearchIndex;

#[async_trait]
impl SearchIndex for FailingSearchIndex {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResult, IndexError> {
        Err(IndexError::Transport("connection refused".into()))
    }

    async fn get(&self, _id: &str) -> Result<Option<SearchDocument>, IndexError> {
        Err(IndexError::Transport("connection refused".into()))
    }

    async fn upsert(&self, _doc: &SearchDocument) -> Result<(), IndexError> {
        Err(IndexError::Transport("connection refused".into()))
    }

    async fn delete(&self, _id: &str) -> Result<(), IndexError> {
        Err(IndexError::Transport("connection refused".into()))
    }
}

/// A document source serving a fixed map; unknown ids answer 404.
#[derive(Debug, Default)]
pub struct StaticDocumentSource {
    docs: HashMap<String, SearchDocument>,
    fetches: AtomicUsize,
}

impl StaticDocumentSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `doc` for its activity id.
    #[must_use]
    pub fn with_document(mut self, doc: SearchDocument) -> Self {
        self.docs.insert(doc.activity_id.clone(), doc);
        self
    }

    /// Number of fetches so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for StaticDocumentSource {
    async fn fetch_activity_document(
        &self,
        activity_id: &str,
    ) -> Result<SearchDocument, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.docs
            .get(activity_id)
            .cloned()
            .ok_or_else(|| SourceError::Status {
                status: 404,
                body: format!("activity {activity_id} not found"),
            })
    }
}

/// A document source that always fails at the transport level.
#[derive(Debug)]
pub struct FailingDocumentSource;

#[async_trait]
impl DocumentSource for FailingDocumentSource {
    async fn fetch_activity_document(
        &self,
        _activity_id: &str,
    ) -> Result<SearchDocument, SourceError> {
        Err(SourceError::Transport("connection refused".into()))
    }
}
