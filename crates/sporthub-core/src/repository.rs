//! Persistence and directory ports for the activities service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::model::{
    Activity, ActivityPatch, Booking, BookingStatus, NewActivity, NewBooking, NewSession, Session,
    SessionPatch,
};

/// Storage for activities.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Persists a new activity and returns it with its assigned id.
    async fn insert(&self, new: &NewActivity, now: DateTime<Utc>) -> Result<Activity, DomainError>;

    /// Loads an activity by id.
    async fn get(&self, id: i64) -> Result<Option<Activity>, DomainError>;

    /// Lists activities ordered by id, returning the page and the total count.
    async fn list(&self, skip: i64, limit: i64) -> Result<(Vec<Activity>, i64), DomainError>;

    /// Writes the present fields of `patch`. Returns `false` if no such activity.
    async fn update(
        &self,
        id: i64,
        patch: &ActivityPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Deletes an activity and its sessions. Returns `false` if no such activity.
    async fn delete(&self, id: i64) -> Result<bool, DomainError>;
}

/// Storage for sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persists a new session and returns it with its assigned id.
    async fn insert(&self, new: &NewSession, now: DateTime<Utc>) -> Result<Session, DomainError>;

    /// Loads a session by id.
    async fn get(&self, id: i64) -> Result<Option<Session>, DomainError>;

    /// Lists an activity's sessions ordered by date and start time.
    async fn list_by_activity(&self, activity_id: i64) -> Result<Vec<Session>, DomainError>;

    /// Writes the present fields of `patch`. Returns `false` if no such session.
    async fn update(
        &self,
        id: i64,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Deletes a session. Returns `false` if no such session.
    async fn delete(&self, id: i64) -> Result<bool, DomainError>;
}

/// Storage for bookings.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Loads a booking by id.
    async fn get(&self, id: i64) -> Result<Option<Booking>, DomainError>;

    /// Returns `true` if `user_id` holds a confirmed booking for `session_id`.
    async fn exists_confirmed(&self, user_id: &str, session_id: i64) -> Result<bool, DomainError>;

    /// Counts confirmed bookings for a session.
    async fn count_confirmed(&self, session_id: i64) -> Result<i64, DomainError>;

    /// Inserts a confirmed booking only if, at commit time, the session still
    /// has fewer than `capacity` confirmed bookings and the user holds none.
    ///
    /// Implementations must make the check and the insert atomic with respect
    /// to other calls for the same session.
    ///
    /// # Errors
    ///
    /// `DomainError::NoCapacity` or `DomainError::DuplicateBooking` when the
    /// guard fails.
    async fn insert_confirmed(
        &self,
        new: &NewBooking,
        capacity: i32,
    ) -> Result<Booking, DomainError>;

    /// Sets the status to `to` only if it is currently `from`.
    /// Returns `false` if the booking was missing or in another status.
    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, DomainError>;

    /// Lists a user's bookings, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, DomainError>;
}

/// Lookup into the users service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns `true` if the user exists.
    async fn user_exists(&self, user_id: &str) -> Result<bool, DomainError>;
}
