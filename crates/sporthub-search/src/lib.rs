//! SportHub: search read path and index projection.
//!
//! Reads go through a two-tier cache cascade in front of the document index.
//! Writes arrive as change envelopes from the event bus: the [`Projector`]
//! re-fetches each changed activity from its origin service, replaces the
//! indexed document, and evicts the cached copies.

pub mod cache;
pub mod infrastructure;
pub mod projector;
pub mod service;

pub use projector::{Projection, ProjectionError, Projector};
pub use service::{CacheInvalidator, SearchService};
