//! Routes for activities and their sessions.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sporthub_activities::application::{command_handlers, query_handlers};
use sporthub_activities::domain::commands;
use sporthub_core::command::Command;
use sporthub_core::model::session::hhmm;
use sporthub_core::model::{Activity, ActivityPatch, NewActivity, NewSession, Session};
use sporthub_core::search::SearchDocument;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::requester::Requester;
use crate::state::ActivitiesState;

/// Query string of GET /activities.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Rows to skip.
    pub skip: Option<i64>,
    /// Page size, at most 100.
    pub limit: Option<i64>,
}

/// Request body for POST /activities/{id}/sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Calendar date.
    pub date: NaiveDate,
    /// Local start time, `HH:MM`.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Local end time, `HH:MM`.
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Maximum confirmed bookings.
    pub capacity: i32,
}

/// Response body of POST /activities/reindex.
#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    /// Number of activities announced for re-projection.
    pub published: usize,
}

/// GET /activities
async fn list_activities(
    State(state): State<ActivitiesState>,
    Query(params): Query<ListParams>,
) -> Result<Json<query_handlers::ActivityPage>, ApiError> {
    let page =
        query_handlers::list_activities(params.skip, params.limit, state.activities.as_ref())
            .await?;
    Ok(Json(page))
}

/// POST /activities
#[instrument(skip(state, request), fields(requester = %requester.user_id))]
async fn create_activity(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Json(request): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    requester.require_admin()?;
    let command = commands::CreateActivity {
        correlation_id: Uuid::new_v4(),
        activity: request,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let activity = command_handlers::handle_create_activity(
        &command,
        state.clock.as_ref(),
        state.users.as_ref(),
        state.activities.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(activity)))
}

/// GET /activities/{id}
async fn get_activity(
    State(state): State<ActivitiesState>,
    Path(id): Path<i64>,
) -> Result<Json<Activity>, ApiError> {
    let activity = query_handlers::get_activity(id, state.activities.as_ref()).await?;
    Ok(Json(activity))
}

/// PUT /activities/{id}
#[instrument(skip(state, patch), fields(requester = %requester.user_id))]
async fn update_activity(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
    Json(patch): Json<ActivityPatch>,
) -> Result<Json<Activity>, ApiError> {
    requester.require_admin()?;
    let command = commands::UpdateActivity {
        correlation_id: Uuid::new_v4(),
        activity_id: id,
        patch,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let activity = command_handlers::handle_update_activity(
        &command,
        state.clock.as_ref(),
        state.activities.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(Json(activity))
}

/// DELETE /activities/{id}
#[instrument(skip(state), fields(requester = %requester.user_id))]
async fn delete_activity(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    requester.require_admin()?;
    let command = commands::DeleteActivity {
        correlation_id: Uuid::new_v4(),
        activity_id: id,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    command_handlers::handle_delete_activity(
        &command,
        state.clock.as_ref(),
        state.activities.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /activities/{id}/search-doc
async fn get_search_document(
    State(state): State<ActivitiesState>,
    Path(id): Path<i64>,
) -> Result<Json<SearchDocument>, ApiError> {
    let doc = query_handlers::get_activity_search_document(
        id,
        state.activities.as_ref(),
        state.sessions.as_ref(),
    )
    .await?;
    Ok(Json(doc))
}

/// POST /activities/reindex
#[instrument(skip(state), fields(requester = %requester.user_id))]
async fn reindex(
    State(state): State<ActivitiesState>,
    requester: Requester,
) -> Result<Json<ReindexResponse>, ApiError> {
    requester.require_admin()?;
    let command = commands::ReindexActivities {
        correlation_id: Uuid::new_v4(),
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let published = command_handlers::handle_reindex(
        &command,
        state.clock.as_ref(),
        state.activities.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(Json(ReindexResponse { published }))
}

/// GET /activities/{id}/sessions
async fn list_sessions(
    State(state): State<ActivitiesState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions =
        query_handlers::list_sessions(id, state.activities.as_ref(), state.sessions.as_ref())
            .await?;
    Ok(Json(sessions))
}

/// POST /activities/{id}/sessions
#[instrument(skip(state, request), fields(requester = %requester.user_id))]
async fn create_session(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    requester.require_admin()?;
    let command = commands::CreateSession {
        correlation_id: Uuid::new_v4(),
        session: NewSession {
            activity_id: id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            capacity: request.capacity,
        },
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let session = command_handlers::handle_create_session(
        &command,
        state.clock.as_ref(),
        state.activities.as_ref(),
        state.sessions.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Returns the router for activities, mounted at `/activities`.
pub fn router() -> Router<ActivitiesState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route("/reindex", post(reindex))
        .route(
            "/{id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/{id}/search-doc", get(get_search_document))
        .route("/{id}/sessions", get(list_sessions).post(create_session))
}
