//! Routes for the search read path.

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::Deserialize;
use sporthub_core::search::{DEFAULT_PAGE_SIZE, SearchDocument, SearchQuery, SearchResult};
use tracing::instrument;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::SearchState;

/// Query string of GET /search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Free text.
    #[serde(default)]
    pub query: String,
    /// Exact category.
    #[serde(default)]
    pub category: String,
    /// Exact location.
    #[serde(default)]
    pub location: String,
    /// Earliest start date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// `field asc|desc`.
    #[serde(default)]
    pub sort: String,
    /// 1-based page.
    pub page: Option<u32>,
    /// Page size.
    pub size: Option<u32>,
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        Self {
            text: params.query,
            category: params.category,
            location: params.location,
            date: params.date,
            sort: params.sort,
            page: params.page.unwrap_or(1),
            size: params.size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

/// GET /search
#[instrument(skip(state))]
async fn search(
    State(state): State<SearchState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state.search.search(params.into()).await?;
    Ok(Json(result))
}

/// GET /search/documents/{id}
async fn get_document(
    State(state): State<SearchState>,
    Path(id): Path<String>,
) -> Result<Json<SearchDocument>, ApiError> {
    let doc = state.search.get_document(&id).await?;
    Ok(Json(doc))
}

/// Returns the search router, mounted at `/search`.
pub fn router() -> Router<SearchState> {
    Router::new()
        .route("/", get(search))
        .route("/documents/{id}", get(get_document))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use sporthub_core::search::SearchIndex;
    use sporthub_search::SearchService;
    use sporthub_search::cache::InMemorySharedCache;
    use sporthub_test_support::{FailingSearchIndex, InMemorySearchIndex, sample_document};

    use super::*;
    use crate::routes::testing::send;

    fn app_over(index: Arc<dyn SearchIndex>) -> Router {
        let service = SearchService::new(
            index,
            Arc::new(InMemorySharedCache::new()),
            100,
            Duration::from_secs(60),
        );
        Router::new()
            .nest("/search", router())
            .with_state(SearchState::new(Arc::new(service)))
    }

    #[tokio::test]
    async fn test_search_returns_matching_page() {
        // Arrange
        let index = Arc::new(
            InMemorySearchIndex::new()
                .with_document(sample_document("1", "Futbol 5"))
                .with_document(sample_document("2", "Yoga")),
        );

        // Act
        let (status, json) = send(app_over(index), "GET", "/search?query=futbol", None, None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 1);
        assert_eq!(json["page"], 1);
        assert_eq!(json["size"], 10);
        assert_eq!(json["docs"][0]["name"], "Futbol 5");
    }

    #[tokio::test]
    async fn test_non_numeric_page_is_validation_error() {
        let index = Arc::new(InMemorySearchIndex::new());
        let app = app_over(index.clone());

        let (status, json) = send(app, "GET", "/search?page=abc", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["message"], "invalid request");
        assert_eq!(index.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_searches_hit_the_index_once() {
        let index =
            Arc::new(InMemorySearchIndex::new().with_document(sample_document("1", "Yoga")));
        let app = app_over(index.clone());

        let (first, _) = send(app.clone(), "GET", "/search?query=yoga", None, None).await;
        let (second, _) = send(app, "GET", "/search?query=%20YOGA%20", None, None).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(index.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_oversized_page_returns_400() {
        let index = Arc::new(InMemorySearchIndex::new());

        let (status, json) = send(app_over(index), "GET", "/search?size=500", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_index_failure_returns_500() {
        let (status, json) =
            send(app_over(Arc::new(FailingSearchIndex)), "GET", "/search", None, None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "internal_error");
    }

    #[tokio::test]
    async fn test_get_document_by_id() {
        let index =
            Arc::new(InMemorySearchIndex::new().with_document(sample_document("42", "Yoga")));

        let (status, json) =
            send(app_over(index), "GET", "/search/documents/42", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], "42");
    }

    #[tokio::test]
    async fn test_get_missing_document_returns_404() {
        let index = Arc::new(InMemorySearchIndex::new());

        let (status, json) =
            send(app_over(index), "GET", "/search/documents/42", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }
}
