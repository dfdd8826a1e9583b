//! Domain error types.

use thiserror::Error;

/// Top-level domain error type shared by every service.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`activity`, `session`, `booking`, `user`, `document`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Malformed identifiers or missing/invalid fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// The user already holds a confirmed booking for the session.
    #[error("user {user_id} already holds a confirmed booking for session {session_id}")]
    DuplicateBooking {
        /// The requesting user.
        user_id: String,
        /// The session being booked.
        session_id: i64,
    },

    /// Confirmed bookings already reached the session's capacity.
    #[error("session {session_id} has no remaining capacity ({capacity})")]
    NoCapacity {
        /// The full session.
        session_id: i64,
        /// The session's capacity ceiling.
        capacity: i32,
    },

    /// The requester may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A booking status change that the lifecycle does not allow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },

    /// A bounded concurrent operation did not finish in time.
    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` for errors that represent a business-rule violation
    /// rather than an infrastructure or timeout failure.
    #[must_use]
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::DuplicateBooking { .. }
                | Self::NoCapacity { .. }
                | Self::Forbidden(_)
                | Self::InvalidTransition { .. }
        )
    }
}
