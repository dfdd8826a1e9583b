//! Test user directories.

use std::collections::HashSet;

use async_trait::async_trait;
use sporthub_core::error::DomainError;
use sporthub_core::repository::UserDirectory;

/// A directory that knows a fixed set of user ids.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    known: HashSet<String>,
}

impl StaticUserDirectory {
    /// Directory containing exactly `ids`.
    #[must_use]
    pub fn with_users(ids: &[&str]) -> Self {
        Self {
            known: ids.iter().map(|id| (*id).to_owned()).collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn user_exists(&self, user_id: &str) -> Result<bool, DomainError> {
        Ok(self.known.contains(user_id))
    }
}

/// A directory whose lookups always fail, as if the users service were down.
#[derive(Debug)]
pub struct FailingUserDirectory;

#[async_trait]
impl UserDirectory for FailingUserDirectory {
    async fn user_exists(&self, _user_id: &str) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("users service unavailable".into()))
    }
}
