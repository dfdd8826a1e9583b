//! `DocumentSource` backed by the activities service's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sporthub_core::search::{DocumentSource, SearchDocument, SourceError};
use tracing::debug;

/// Fetches `GET {base}/activities/{id}/search-doc`.
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDocumentSource {
    /// Client for the activities service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch_activity_document(
        &self,
        activity_id: &str,
    ) -> Result<SearchDocument, SourceError> {
        let url = format!("{}/activities/{activity_id}/search-doc", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let doc: SearchDocument = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        debug!(activity_id, "fetched search document");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn source_with(template: ResponseTemplate) -> (MockServer, HttpDocumentSource) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities/42/search-doc"))
            .respond_with(template)
            .mount(&server)
            .await;
        let source = HttpDocumentSource::new(&server.uri(), Duration::from_secs(2)).unwrap();
        (server, source)
    }

    #[tokio::test]
    async fn test_fetch_decodes_document() {
        // Arrange
        let (_server, source) = source_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "activity_id": "42",
            "session_id": "",
            "name": "Futbol 5",
            "category": "football",
            "location": "Club Norte",
            "instructor": "",
            "start_dt": "2026-02-01T19:00:00Z",
            "end_dt": "2026-02-01T20:00:00Z",
            "difficulty": 1,
            "price": 100.0,
            "tags": ["outdoor"],
            "updated_dt": "2026-01-15T10:00:00Z"
        })))
        .await;

        // Act
        let doc = source.fetch_activity_document("42").await.unwrap();

        // Assert
        assert_eq!(doc.id, "42");
        assert_eq!(doc.name, "Futbol 5");
        assert_eq!(doc.tags, vec!["outdoor"]);
        assert!(doc.start_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_activity_is_a_status_error() {
        let (_server, source) =
            source_with(ResponseTemplate::new(404).set_body_string("activity not found")).await;

        let err = source.fetch_activity_document("42").await.unwrap_err();

        assert!(matches!(err, SourceError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_non_document_body_is_a_decode_error() {
        let (_server, source) =
            source_with(ResponseTemplate::new(200).set_body_string("<html>")).await;

        let err = source.fetch_activity_document("42").await.unwrap_err();

        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_a_transport_error() {
        let source =
            HttpDocumentSource::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();

        let err = source.fetch_activity_document("42").await.unwrap_err();

        assert!(matches!(err, SourceError::Transport(_)));
    }
}
