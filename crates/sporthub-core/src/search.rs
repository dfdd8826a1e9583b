//! Search documents, queries, and the index/origin ports.
//!
//! The activities service produces [`SearchDocument`]s on request; the search
//! service stores them in a [`SearchIndex`] and answers [`SearchQuery`]s.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::DomainError;

/// Sort applied when the query does not name one.
pub const DEFAULT_SORT: &str = "start_dt asc";
/// Page size applied when the query does not name one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Denormalized projection of an activity, rebuilt wholesale on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Index-wide unique id; equals the activity id.
    pub id: String,
    /// Owning activity.
    pub activity_id: String,
    /// Always empty: sessions are folded into their activity's document.
    #[serde(default)]
    pub session_id: String,
    /// Display name.
    pub name: String,
    /// Sport or discipline.
    #[serde(default)]
    pub category: String,
    /// Venue.
    #[serde(default)]
    pub location: String,
    /// Attributed instructor.
    #[serde(default)]
    pub instructor: String,
    /// Start of the earliest session, if any.
    #[serde(
        rename = "start_dt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_datetime::deserialize"
    )]
    pub start_at: Option<DateTime<Utc>>,
    /// End of the earliest session, if any.
    #[serde(
        rename = "end_dt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_datetime::deserialize"
    )]
    pub end_at: Option<DateTime<Utc>>,
    /// Difficulty rating.
    #[serde(default)]
    pub difficulty: i32,
    /// Base price.
    #[serde(default)]
    pub price: f64,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Last modification of the source activity.
    #[serde(
        rename = "updated_dt",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_datetime::deserialize"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total matches across all pages.
    pub total: u64,
    /// Echoed 1-based page number.
    pub page: u32,
    /// Echoed page size.
    pub size: u32,
    /// Documents on this page.
    pub docs: Vec<SearchDocument>,
}

/// A normalized read query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text term, lowercased with collapsed whitespace.
    pub text: String,
    /// Category filter.
    pub category: String,
    /// Location filter.
    pub location: String,
    /// Lower bound on the start date, `YYYY-MM-DD`.
    pub date: String,
    /// Sort expression, `field asc|desc`.
    pub sort: String,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: String::new(),
            location: String::new(),
            date: String::new(),
            sort: DEFAULT_SORT.to_owned(),
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    /// Normalizes and validates the query.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a page below 1, a size outside
    /// `1..=100`, a malformed date, or a malformed sort expression.
    pub fn normalized(self) -> Result<Self, DomainError> {
        if self.page < 1 {
            return Err(DomainError::Validation("page must be >= 1".to_owned()));
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(DomainError::Validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let date = self.date.trim().to_owned();
        if !date.is_empty() && NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
            return Err(DomainError::Validation("date must be YYYY-MM-DD".to_owned()));
        }

        let sort = normalize_sort(&self.sort)?;

        Ok(Self {
            text: self
                .text
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            category: self.category.trim().to_owned(),
            location: self.location.trim().to_owned(),
            date,
            sort,
            page: self.page,
            size: self.size,
        })
    }

    /// Deterministic cache key over the full query tuple.
    ///
    /// The same key is used by both cache tiers.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let raw = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.text, self.category, self.location, self.date, self.sort, self.page, self.size
        );
        let digest = Sha256::digest(raw.as_bytes());
        format!("q:{}", hex::encode(digest))
    }

    /// Offset of the first row on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

fn normalize_sort(raw: &str) -> Result<String, DomainError> {
    let mut parts = raw.split_whitespace();
    let (Some(field), direction, None) = (parts.next(), parts.next(), parts.next()) else {
        if raw.trim().is_empty() {
            return Ok(DEFAULT_SORT.to_owned());
        }
        return Err(DomainError::Validation("invalid sort expression".to_owned()));
    };
    let field_ok = field
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    let direction = direction.unwrap_or("asc").to_ascii_lowercase();
    if !field_ok || !matches!(direction.as_str(), "asc" | "desc") {
        return Err(DomainError::Validation("invalid sort expression".to_owned()));
    }
    Ok(format!("{field} {direction}"))
}

/// Failure talking to the search index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Transport-level failure.
    #[error("index request failed: {0}")]
    Transport(String),
    /// The index answered with an error.
    #[error("index rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status returned.
        status: u16,
        /// Error message from the index.
        message: String,
    },
    /// The index response could not be decoded.
    #[error("malformed index response: {0}")]
    Decode(String),
}

impl From<IndexError> for DomainError {
    fn from(err: IndexError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

/// The document index the search service reads from and the projector writes to.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Executes a normalized query.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, IndexError>;

    /// Loads one document by id.
    async fn get(&self, id: &str) -> Result<Option<SearchDocument>, IndexError>;

    /// Writes a document, replacing any document with the same id.
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), IndexError>;

    /// Deletes a document by id; deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> Result<(), IndexError>;
}

/// Failure fetching a document from its origin service.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure.
    #[error("origin request failed: {0}")]
    Transport(String),
    /// The origin answered with a non-200 status.
    #[error("origin returned {status}: {body}")]
    Status {
        /// HTTP status returned.
        status: u16,
        /// Response body, for logs.
        body: String,
    },
    /// The origin body was not a search document.
    #[error("malformed origin document: {0}")]
    Decode(String),
}

/// The service that owns the authoritative data for search documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches the current search document for an activity.
    async fn fetch_activity_document(&self, activity_id: &str)
    -> Result<SearchDocument, SourceError>;
}

mod optional_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Accepts RFC 3339, null, absent, or the empty string (as `None`).
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => DateTime::parse_from_rfc3339(value)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str) -> SearchQuery {
        SearchQuery {
            text: text.to_owned(),
            ..SearchQuery::default()
        }
    }

    #[test]
    fn test_equivalent_queries_share_a_cache_key() {
        let a = query("  Futbol   5 ").normalized().unwrap();
        let b = query("futbol 5").normalized().unwrap();

        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_is_fixed_width() {
        let key = query("yoga").normalized().unwrap().cache_key();
        assert!(key.starts_with("q:"));
        assert_eq!(key.len(), 2 + 64);
    }

    #[test]
    fn test_different_pages_have_different_keys() {
        let first = query("yoga").normalized().unwrap();
        let second = SearchQuery {
            page: 2,
            ..first.clone()
        };
        assert_ne!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn test_size_above_limit_is_rejected() {
        let q = SearchQuery {
            size: 101,
            ..SearchQuery::default()
        };
        assert!(q.normalized().is_err());
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let q = SearchQuery {
            page: 0,
            ..SearchQuery::default()
        };
        assert!(q.normalized().is_err());
    }

    #[test]
    fn test_blank_sort_defaults_and_bad_sort_is_rejected() {
        let q = SearchQuery {
            sort: "  ".to_owned(),
            ..SearchQuery::default()
        };
        assert_eq!(q.normalized().unwrap().sort, DEFAULT_SORT);

        let q = SearchQuery {
            sort: "price_f; drop".to_owned(),
            ..SearchQuery::default()
        };
        assert!(q.normalized().is_err());
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let q = SearchQuery {
            date: "01/02/2026".to_owned(),
            ..SearchQuery::default()
        };
        assert!(q.normalized().is_err());
    }

    #[test]
    fn test_offset_uses_one_based_pages() {
        let q = SearchQuery {
            page: 3,
            size: 20,
            ..SearchQuery::default()
        };
        assert_eq!(q.offset(), 40);
    }

    #[test]
    fn test_document_accepts_empty_date_strings() {
        let doc: SearchDocument = serde_json::from_str(
            r#"{"id":"42","activity_id":"42","session_id":"","name":"Yoga",
                "start_dt":"","end_dt":"","price":10.5,"tags":[],
                "updated_dt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(doc.start_at, None);
        assert_eq!(doc.end_at, None);
        assert!(doc.updated_at.is_some());
    }

    #[test]
    fn test_document_omits_absent_dates_when_serialized() {
        let doc = SearchDocument {
            id: "1".to_owned(),
            activity_id: "1".to_owned(),
            session_id: String::new(),
            name: "Yoga".to_owned(),
            category: String::new(),
            location: String::new(),
            instructor: String::new(),
            start_at: None,
            end_at: None,
            difficulty: 1,
            price: 10.0,
            tags: Vec::new(),
            updated_at: None,
        };

        let json = serde_json::to_value(&doc).unwrap();

        assert!(json.get("start_dt").is_none());
        assert!(json.get("updated_dt").is_none());
    }
}
