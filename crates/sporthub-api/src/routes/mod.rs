//! Route modules and the two service routers.

pub mod activities;
pub mod enrollments;
pub mod health;
pub mod search;
pub mod sessions;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::{ActivitiesState, SearchState};

/// Full router of the activities service.
pub fn activities_app(state: ActivitiesState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/activities", activities::router())
        .nest("/sessions", sessions::router())
        .nest("/enrollments", enrollments::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Full router of the search service.
pub fn search_app(state: SearchState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/search", search::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
