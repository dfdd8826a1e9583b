//! Command abstractions.

use uuid::Uuid;

/// Trait that all write-side commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through logs and published events.
    fn correlation_id(&self) -> Uuid;
}
