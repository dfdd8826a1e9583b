//! SportHub Store: `PostgreSQL` implementations of the repository ports.
//!
//! Queries are built at runtime with `sqlx::query_as`; the schema lives in the
//! workspace `migrations/` directory.

pub mod pg_activity_repository;
pub mod pg_booking_repository;
pub mod pg_session_repository;

pub use pg_activity_repository::PgActivityRepository;
pub use pg_booking_repository::PgBookingRepository;
pub use pg_session_repository::PgSessionRepository;

use sporthub_core::error::DomainError;

/// Wraps a driver error as an infrastructure failure.
pub(crate) fn storage(context: &str, err: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("{context}: {err}"))
}
