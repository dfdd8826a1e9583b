//! Shared test fakes and utilities for the SportHub services.

mod clock;
mod directory;
mod publisher;
mod repository;
mod search;

pub use clock::FixedClock;
pub use directory::{FailingUserDirectory, StaticUserDirectory};
pub use publisher::{FailingPublisher, RecordingPublisher};
pub use repository::{
    FailingActivityRepository, InMemoryActivityRepository, InMemoryBookingRepository,
    InMemorySessionRepository,
};
pub use search::{
    FailingDocumentSource, FailingSearchIndex, InMemorySearchIndex, StaticDocumentSource,
    sample_document,
};
