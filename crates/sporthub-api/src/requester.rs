//! Identity of the caller, as asserted by the gateway.
//!
//! The gateway authenticates users and forwards `x-user-id` and
//! `x-user-role`. Handlers that act on behalf of a user extract a
//! [`Requester`]; a request without a user id is rejected with 401.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use sporthub_core::error::DomainError;

use crate::error::ErrorBody;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// User id.
    pub user_id: String,
    /// Role name; `admin` unlocks catalog management.
    pub role: String,
}

impl Requester {
    /// Returns `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ADMIN_ROLE)
    }

    /// Fails unless the requester is an administrator.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Forbidden` for non-admins.
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "administrator role required".to_owned(),
            ))
        }
    }
}

/// Rejection for requests without an identity.
#[derive(Debug)]
pub struct MissingIdentity;

impl IntoResponse for MissingIdentity {
    fn into_response(self) -> Response {
        ErrorBody::into_response(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            format!("missing {USER_ID_HEADER} header"),
        )
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = MissingIdentity;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or(MissingIdentity)?;
        let role = header(parts, USER_ROLE_HEADER).unwrap_or_default();
        Ok(Self { user_id, role })
    }
}
