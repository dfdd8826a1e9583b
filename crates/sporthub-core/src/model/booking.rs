//! Bookings (enrollments) of a user into a session.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Reserved but not yet confirmed.
    Pending,
    /// Confirmed; counts against session capacity.
    Confirmed,
    /// Cancelled; terminal.
    Cancelled,
}

impl BookingStatus {
    /// Returns the stored/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Checks that moving to `next` is allowed.
    ///
    /// `confirmed -> cancelled` is the only legal transition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` for anything else.
    pub fn transition_to(self, next: Self) -> Result<Self, DomainError> {
        match (self, next) {
            (Self::Confirmed, Self::Cancelled) => Ok(next),
            (from, to) => Err(DomainError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Infrastructure(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// A persisted booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier.
    pub id: i64,
    /// Booked session.
    pub session_id: i64,
    /// Parent activity of the session.
    pub activity_id: i64,
    /// Booking owner.
    pub user_id: String,
    /// Price computed at enrollment.
    pub final_price: f64,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A booking about to be committed as confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    /// Booked session.
    pub session_id: i64,
    /// Parent activity of the session.
    pub activity_id: i64,
    /// Booking owner.
    pub user_id: String,
    /// Price computed at enrollment.
    pub final_price: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
