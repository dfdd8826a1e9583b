//! Routes for enrollments (bookings).

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use sporthub_activities::application::{enrollment, query_handlers};
use sporthub_activities::domain::commands;
use sporthub_core::command::Command;
use sporthub_core::error::DomainError;
use sporthub_core::model::Booking;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::requester::Requester;
use crate::state::ActivitiesState;

/// Request body for POST /enrollments.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    /// Session to book.
    pub session_id: i64,
}

/// POST /enrollments
#[instrument(
    skip(state, request),
    fields(user_id = %requester.user_id, session_id = request.session_id)
)]
async fn enroll(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let command = commands::Enroll {
        correlation_id: Uuid::new_v4(),
        session_id: request.session_id,
        user_id: requester.user_id,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let booking = enrollment::handle_enroll(
        &command,
        state.clock.as_ref(),
        state.enrollment_stores(),
        state.publisher.as_ref(),
        state.branch_timeout,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// PATCH /enrollments/{id}/cancel
#[instrument(skip(state), fields(requester = %requester.user_id))]
async fn cancel(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, ApiError> {
    let command = commands::CancelEnrollment {
        correlation_id: Uuid::new_v4(),
        booking_id: id,
        requester_is_admin: requester.is_admin(),
        requester_id: requester.user_id,
    };

    info!(
        correlation_id = %command.correlation_id,
        command = command.command_type(),
        "handling command"
    );

    let booking = enrollment::handle_cancel_enrollment(
        &command,
        state.clock.as_ref(),
        state.bookings.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(Json(booking))
}

/// GET /enrollments/by-user/{user_id}
///
/// Users may list their own bookings; admins may list anyone's.
async fn list_by_user(
    State(state): State<ActivitiesState>,
    requester: Requester,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    if requester.user_id != user_id.trim() && !requester.is_admin() {
        let denied = DomainError::Forbidden("cannot list another user's enrollments".to_owned());
        return Err(denied.into());
    }
    let bookings =
        query_handlers::list_enrollments_by_user(&user_id, state.bookings.as_ref()).await?;
    Ok(Json(bookings))
}

/// Returns the router for enrollments, mounted at `/enrollments`.
pub fn router() -> Router<ActivitiesState> {
    Router::new()
        .route("/", post(enroll))
        .route("/{id}/cancel", patch(cancel))
        .route("/by-user/{user_id}", get(list_by_user))
}
