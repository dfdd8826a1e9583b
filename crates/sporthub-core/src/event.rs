//! Event envelopes published on the activities exchange.
//!
//! Two payload shapes travel over the bus. [`EventEnvelope`] describes a
//! create/update/delete against an activity or one of its sessions and is what
//! the search projector consumes. [`BookingEvent`] describes booking lifecycle
//! changes; it shares the exchange but never touches search documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing keys used on the topic exchange.
pub mod routing {
    /// An activity was created.
    pub const ACTIVITY_CREATED: &str = "activity.created";
    /// An activity was updated.
    pub const ACTIVITY_UPDATED: &str = "activity.updated";
    /// An activity was deleted.
    pub const ACTIVITY_DELETED: &str = "activity.deleted";
    /// A session was created.
    pub const SESSION_CREATED: &str = "activity.session.created";
    /// A session was updated.
    pub const SESSION_UPDATED: &str = "activity.session.updated";
    /// A session was deleted.
    pub const SESSION_DELETED: &str = "activity.session.deleted";
    /// A booking was confirmed.
    pub const BOOKING_CREATED: &str = "booking.created";
    /// A booking was cancelled.
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";

    /// Prefix shared by all booking routing keys.
    pub const BOOKING_PREFIX: &str = "booking.";
}

/// Operation carried by an [`EventEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOp {
    /// Entity created.
    Create,
    /// Entity updated.
    Update,
    /// Entity deleted.
    Delete,
}

impl EventOp {
    /// Returns the wire name of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Change notification for an activity or session.
///
/// Inapplicable identifiers are empty strings rather than absent fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// The operation performed.
    pub op: EventOp,
    /// Activity identifier; the primary identifier of every envelope.
    #[serde(default)]
    pub activity_id: String,
    /// Session identifier; empty for activity-level events.
    #[serde(default)]
    pub session_id: String,
    /// When the originating write committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EventEnvelope {
    /// Builds an activity-level envelope.
    #[must_use]
    pub fn for_activity(op: EventOp, activity_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            op,
            activity_id: activity_id.to_string(),
            session_id: String::new(),
            timestamp: Some(timestamp),
        }
    }

    /// Builds a session-level envelope; the activity is the session's parent.
    #[must_use]
    pub fn for_session(
        op: EventOp,
        activity_id: i64,
        session_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            op,
            activity_id: activity_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: Some(timestamp),
        }
    }

    /// Returns `true` if the envelope describes a session change.
    ///
    /// A session id of `"0"` is treated as absent.
    #[must_use]
    pub fn is_session_event(&self) -> bool {
        let session_id = self.session_id.trim();
        !session_id.is_empty() && session_id != "0"
    }

    /// Returns the primary identifier, trimmed.
    #[must_use]
    pub fn primary_id(&self) -> &str {
        self.activity_id.trim()
    }
}

/// Operation carried by a [`BookingEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventOp {
    /// Booking confirmed.
    Created,
    /// Booking cancelled.
    Cancelled,
}

/// Booking lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    /// The lifecycle change.
    pub op: BookingEventOp,
    /// Booking identifier.
    pub booking_id: i64,
    /// Booked session.
    pub session_id: i64,
    /// Parent activity of the session.
    pub activity_id: i64,
    /// Booking owner.
    pub user_id: String,
    /// Price charged at enrollment.
    pub final_price: f64,
    /// When the change committed.
    pub timestamp: DateTime<Utc>,
}
