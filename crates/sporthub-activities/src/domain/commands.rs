//! Commands for the activities context.

use sporthub_core::command::Command;
use sporthub_core::model::{ActivityPatch, NewActivity, NewSession, SessionPatch};
use uuid::Uuid;

/// Command to create an activity.
#[derive(Debug, Clone)]
pub struct CreateActivity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The activity to create.
    pub activity: NewActivity,
}

/// Command to update the present fields of an activity.
#[derive(Debug, Clone)]
pub struct UpdateActivity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The activity identifier.
    pub activity_id: i64,
    /// The fields to write.
    pub patch: ActivityPatch,
}

/// Command to delete an activity.
#[derive(Debug, Clone)]
pub struct DeleteActivity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The activity identifier.
    pub activity_id: i64,
}

/// Command to re-announce every activity so the search index is rebuilt.
#[derive(Debug, Clone)]
pub struct ReindexActivities {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

/// Command to create a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session to create.
    pub session: NewSession,
}

/// Command to update the present fields of a session.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: i64,
    /// The fields to write.
    pub patch: SessionPatch,
}

/// Command to delete a session.
#[derive(Debug, Clone)]
pub struct DeleteSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: i64,
}

/// Command to book a user into a session.
#[derive(Debug, Clone)]
pub struct Enroll {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session to book.
    pub session_id: i64,
    /// The user booking.
    pub user_id: String,
}

/// Command to cancel a confirmed booking.
#[derive(Debug, Clone)]
pub struct CancelEnrollment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The booking identifier.
    pub booking_id: i64,
    /// The user asking for the cancellation.
    pub requester_id: String,
    /// Whether the requester holds the admin role.
    pub requester_is_admin: bool,
}

macro_rules! impl_command {
    ($($ty:ident => $name:literal),+ $(,)?) => {
        $(
            impl Command for $ty {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }
            }
        )+
    };
}

impl_command! {
    CreateActivity => "activities.create_activity",
    UpdateActivity => "activities.update_activity",
    DeleteActivity => "activities.delete_activity",
    ReindexActivities => "activities.reindex",
    CreateSession => "activities.create_session",
    UpdateSession => "activities.update_session",
    DeleteSession => "activities.delete_session",
    Enroll => "activities.enroll",
    CancelEnrollment => "activities.cancel_enrollment",
}
