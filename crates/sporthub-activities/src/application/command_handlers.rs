//! Command handlers for activities and sessions.
//!
//! Each handler validates, writes through its repository, and only after the
//! write commits announces the change on the event bus. Publishing is best
//! effort: a broker failure is logged and never fails the command.

use sporthub_core::clock::Clock;
use sporthub_core::error::DomainError;
use sporthub_core::event::{EventEnvelope, EventOp, routing};
use sporthub_core::model::{Activity, Session};
use sporthub_core::publisher::{EventPublisher, publish_best_effort};
use sporthub_core::repository::{ActivityRepository, SessionRepository, UserDirectory};
use tracing::{debug, info};

use crate::domain::commands::{
    CreateActivity, CreateSession, DeleteActivity, DeleteSession, ReindexActivities,
    UpdateActivity, UpdateSession,
};

const REINDEX_PAGE: i64 = 100;

/// Handles the `CreateActivity` command: checks the owner exists, persists
/// the activity, and publishes `activity.created`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid fields or an unknown owner,
/// or any repository/directory error.
pub async fn handle_create_activity(
    command: &CreateActivity,
    clock: &dyn Clock,
    users: &dyn UserDirectory,
    repo: &dyn ActivityRepository,
    publisher: &dyn EventPublisher,
) -> Result<Activity, DomainError> {
    command.activity.validate()?;
    if !users.user_exists(&command.activity.owner_user_id).await? {
        return Err(DomainError::Validation(format!(
            "owner user {} does not exist",
            command.activity.owner_user_id
        )));
    }

    let now = clock.now();
    let activity = repo.insert(&command.activity, now).await?;
    info!(
        correlation_id = %command.correlation_id,
        activity_id = activity.id,
        "activity created"
    );

    let envelope = EventEnvelope::for_activity(EventOp::Create, activity.id, now);
    publish_best_effort(publisher, routing::ACTIVITY_CREATED, &envelope).await;
    Ok(activity)
}

/// Handles the `UpdateActivity` command: writes the present fields and
/// publishes `activity.updated`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty or invalid patch,
/// `DomainError::NotFound` if the activity does not exist.
pub async fn handle_update_activity(
    command: &UpdateActivity,
    clock: &dyn Clock,
    repo: &dyn ActivityRepository,
    publisher: &dyn EventPublisher,
) -> Result<Activity, DomainError> {
    command.patch.validate()?;

    let now = clock.now();
    if !repo.update(command.activity_id, &command.patch, now).await? {
        return Err(DomainError::not_found("activity", command.activity_id));
    }
    let activity = repo
        .get(command.activity_id)
        .await?
        .ok_or_else(|| DomainError::not_found("activity", command.activity_id))?;

    let envelope = EventEnvelope::for_activity(EventOp::Update, activity.id, now);
    publish_best_effort(publisher, routing::ACTIVITY_UPDATED, &envelope).await;
    Ok(activity)
}

/// Handles the `DeleteActivity` command: deletes the activity (and its
/// sessions) and publishes `activity.deleted`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the activity does not exist.
pub async fn handle_delete_activity(
    command: &DeleteActivity,
    clock: &dyn Clock,
    repo: &dyn ActivityRepository,
    publisher: &dyn EventPublisher,
) -> Result<(), DomainError> {
    if !repo.delete(command.activity_id).await? {
        return Err(DomainError::not_found("activity", command.activity_id));
    }
    info!(
        correlation_id = %command.correlation_id,
        activity_id = command.activity_id,
        "activity deleted"
    );

    let envelope = EventEnvelope::for_activity(EventOp::Delete, command.activity_id, clock.now());
    publish_best_effort(publisher, routing::ACTIVITY_DELETED, &envelope).await;
    Ok(())
}

/// Handles the `ReindexActivities` command: publishes `activity.updated` for
/// every stored activity so the projector rebuilds each document.
///
/// Returns the number of activities announced.
///
/// # Errors
///
/// Returns any repository error raised while paging through activities.
pub async fn handle_reindex(
    command: &ReindexActivities,
    clock: &dyn Clock,
    repo: &dyn ActivityRepository,
    publisher: &dyn EventPublisher,
) -> Result<usize, DomainError> {
    let now = clock.now();
    let mut announced = 0usize;
    let mut skip = 0i64;
    loop {
        let (page, _total) = repo.list(skip, REINDEX_PAGE).await?;
        if page.is_empty() {
            break;
        }
        for activity in &page {
            let envelope = EventEnvelope::for_activity(EventOp::Update, activity.id, now);
            publish_best_effort(publisher, routing::ACTIVITY_UPDATED, &envelope).await;
        }
        announced += page.len();
        skip += REINDEX_PAGE;
        debug!(announced, "reindex page published");
    }
    info!(correlation_id = %command.correlation_id, announced, "reindex published");
    Ok(announced)
}

/// Handles the `CreateSession` command: checks the parent activity exists,
/// persists the session, and publishes `activity.session.created`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid window or capacity,
/// `DomainError::NotFound` if the parent activity does not exist.
pub async fn handle_create_session(
    command: &CreateSession,
    clock: &dyn Clock,
    activities: &dyn ActivityRepository,
    sessions: &dyn SessionRepository,
    publisher: &dyn EventPublisher,
) -> Result<Session, DomainError> {
    command.session.validate()?;
    let activity_id = command.session.activity_id;
    if activities.get(activity_id).await?.is_none() {
        return Err(DomainError::not_found("activity", activity_id));
    }

    let now = clock.now();
    let session = sessions.insert(&command.session, now).await?;
    info!(
        correlation_id = %command.correlation_id,
        activity_id,
        session_id = session.id,
        "session created"
    );

    let envelope = EventEnvelope::for_session(EventOp::Create, activity_id, session.id, now);
    publish_best_effort(publisher, routing::SESSION_CREATED, &envelope).await;
    Ok(session)
}

/// Handles the `UpdateSession` command: validates the merged session, writes
/// the present fields, and publishes `activity.session.updated`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the session does not exist, or
/// `DomainError::Validation` if the merged session would be invalid.
pub async fn handle_update_session(
    command: &UpdateSession,
    clock: &dyn Clock,
    sessions: &dyn SessionRepository,
    publisher: &dyn EventPublisher,
) -> Result<Session, DomainError> {
    let current = sessions
        .get(command.session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", command.session_id))?;
    command.patch.merge(&current)?;

    let now = clock.now();
    if !sessions.update(command.session_id, &command.patch, now).await? {
        return Err(DomainError::not_found("session", command.session_id));
    }
    let session = sessions
        .get(command.session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", command.session_id))?;

    let envelope =
        EventEnvelope::for_session(EventOp::Update, session.activity_id, session.id, now);
    publish_best_effort(publisher, routing::SESSION_UPDATED, &envelope).await;
    Ok(session)
}

/// Handles the `DeleteSession` command: deletes the session and publishes
/// `activity.session.deleted` carrying the parent activity id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the session does not exist.
pub async fn handle_delete_session(
    command: &DeleteSession,
    clock: &dyn Clock,
    sessions: &dyn SessionRepository,
    publisher: &dyn EventPublisher,
) -> Result<(), DomainError> {
    let session = sessions
        .get(command.session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", command.session_id))?;
    if !sessions.delete(command.session_id).await? {
        return Err(DomainError::not_found("session", command.session_id));
    }
    info!(
        correlation_id = %command.correlation_id,
        session_id = command.session_id,
        "session deleted"
    );

    let envelope = EventEnvelope::for_session(
        EventOp::Delete,
        session.activity_id,
        session.id,
        clock.now(),
    );
    publish_best_effort(publisher, routing::SESSION_DELETED, &envelope).await;
    Ok(())
}
