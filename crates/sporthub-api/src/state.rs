//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use sporthub_activities::application::enrollment::EnrollmentStores;
use sporthub_core::clock::Clock;
use sporthub_core::publisher::EventPublisher;
use sporthub_core::repository::{
    ActivityRepository, BookingRepository, SessionRepository, UserDirectory,
};
use sporthub_search::SearchService;

/// State shared by the activities service's handlers.
#[derive(Clone)]
pub struct ActivitiesState {
    /// Time source for timestamps.
    pub clock: Arc<dyn Clock>,
    /// Users service lookup.
    pub users: Arc<dyn UserDirectory>,
    /// Activity storage.
    pub activities: Arc<dyn ActivityRepository>,
    /// Session storage.
    pub sessions: Arc<dyn SessionRepository>,
    /// Booking storage.
    pub bookings: Arc<dyn BookingRepository>,
    /// Event bus publisher.
    pub publisher: Arc<dyn EventPublisher>,
    /// Bound on each concurrent enrollment branch.
    pub branch_timeout: Duration,
}

impl ActivitiesState {
    /// Borrows the repositories used by the enrollment flow.
    #[must_use]
    pub fn enrollment_stores(&self) -> EnrollmentStores<'_> {
        EnrollmentStores {
            activities: self.activities.as_ref(),
            sessions: self.sessions.as_ref(),
            bookings: self.bookings.as_ref(),
        }
    }
}

/// State shared by the search service's handlers.
#[derive(Clone)]
pub struct SearchState {
    /// Cached search over the index.
    pub search: Arc<SearchService>,
}

impl SearchState {
    /// Create new search state.
    #[must_use]
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }
}
