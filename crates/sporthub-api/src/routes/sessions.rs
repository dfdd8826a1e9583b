//! Routes for individual sessions.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use sporthub_activities::application::{command_handlers, query_handlers};
use sporthub_activities::domain::commands;
use sporthub_core::command::Command;
use sporthub_core::model::{Session, SessionPatch};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::requester::Requester;
use crate::state::ActivitiesState;

/// GET /sessions/{id}
async fn get_session(
    State(state): State<ActivitiesState>,
    Path(id): Path<i64>,
) -> Result<Json<Session>, ApiError> {
    let session = query_handlers::get_session(id, state.sessions.as_ref()).await?;
    Ok(Json(session))
}

/// PUT /sessions/{id}
#[instrument(skip(state, patch), fields(requester = %requester.user_id))]
async fn update_session(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<Session>, ApiError> {
    requester.require_admin()?;
    let command = commands::UpdateSession {
        correlation_id: Uuid::new_v4(),
        session_id: id,
        patch,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let session = command_handlers::handle_update_session(
        &command,
        state.clock.as_ref(),
        state.sessions.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(Json(session))
}

/// DELETE /sessions/{id}
#[instrument(skip(state), fields(requester = %requester.user_id))]
async fn delete_session(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    requester.require_admin()?;
    let command = commands::DeleteSession {
        correlation_id: Uuid::new_v4(),
        session_id: id,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    command_handlers::handle_delete_session(
        &command,
        state.clock.as_ref(),
        state.sessions.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for sessions, mounted at `/sessions`.
pub fn router() -> Router<ActivitiesState> {
    Router::new().route(
        "/{id}",
        get(get_session).put(update_session).delete(delete_session),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use sporthub_test_support::{InMemorySessionRepository, RecordingPublisher};

    use super::*;
    use crate::routes::testing::{ADMIN, USER, activities_state, send, session};

    fn app_with(state: ActivitiesState) -> Router {
        Router::new().nest("/sessions", router()).with_state(state)
    }

    fn state_with_session(publisher: Arc<RecordingPublisher>) -> ActivitiesState {
        let mut state = activities_state();
        state.sessions =
            Arc::new(InMemorySessionRepository::new().with_session(session(3, 42, "18:00", 10)));
        state.publisher = publisher;
        state
    }

    #[tokio::test]
    async fn test_get_session_serializes_hhmm_times() {
        let state = state_with_session(Arc::new(RecordingPublisher::new()));

        let (status, json) = send(app_with(state), "GET", "/sessions/3", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["start_time"], "18:00");
        assert_eq!(json["end_time"], "19:00");
        assert_eq!(json["date"], "2026-02-01");
    }

    #[tokio::test]
    async fn test_update_session_publishes_with_both_ids() {
        // Arrange
        let publisher = Arc::new(RecordingPublisher::new());
        let state = state_with_session(publisher.clone());
        let body = json!({ "capacity": 25 });

        // Act
        let (status, json) = send(app_with(state), "PUT", "/sessions/3", ADMIN, Some(&body)).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["capacity"], 25);
        let published = publisher.published();
        assert_eq!(published[0].0, "activity.session.updated");
        assert_eq!(published[0].1["activityId"], "42");
        assert_eq!(published[0].1["sessionId"], "3");
    }

    #[tokio::test]
    async fn test_update_session_with_inverted_window_returns_400() {
        let publisher = Arc::new(RecordingPublisher::new());
        let state = state_with_session(publisher.clone());
        let body = json!({ "end_time": "17:00" });

        let (status, json) = send(app_with(state), "PUT", "/sessions/3", ADMIN, Some(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_delete_session_requires_admin() {
        let state = state_with_session(Arc::new(RecordingPublisher::new()));

        let (status, _) = send(app_with(state), "DELETE", "/sessions/3", USER, None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_session_returns_204_and_publishes() {
        let publisher = Arc::new(RecordingPublisher::new());
        let state = state_with_session(publisher.clone());

        let (status, _) = send(app_with(state), "DELETE", "/sessions/3", ADMIN, None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(publisher.routing_keys(), vec!["activity.session.deleted"]);
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_rejected() {
        let state = state_with_session(Arc::new(RecordingPublisher::new()));

        let (status, json) = send(app_with(state), "GET", "/sessions/abc", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["message"], "invalid request");
    }
}
