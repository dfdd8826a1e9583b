//! `UserDirectory` over the users service's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sporthub_core::error::DomainError;
use sporthub_core::repository::UserDirectory;
use tracing::warn;

/// Checks users with `GET {base}/users/{id}`: 200 means the user exists,
/// 404 that it does not.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    base_url: String,
    http: reqwest::Client,
}

impl HttpUserDirectory {
    /// Client for the users service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Infrastructure(format!("users client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, DomainError> {
        let response = self
            .http
            .get(format!("{}/users/{user_id}", self.base_url))
            .send()
            .await
            .map_err(|e| DomainError::Infrastructure(format!("users service unreachable: {e}")))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                warn!(user_id, status = status.as_u16(), "unexpected users service status");
                Err(DomainError::Infrastructure(format!(
                    "users service returned {status}"
                )))
            }
        }
    }
}
