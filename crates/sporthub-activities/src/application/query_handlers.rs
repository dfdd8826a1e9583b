//! Query handlers for activities, sessions and enrollments.

use serde::Serialize;
use sporthub_core::error::DomainError;
use sporthub_core::model::{Activity, Booking, Session};
use sporthub_core::repository::{ActivityRepository, BookingRepository, SessionRepository};
use sporthub_core::search::SearchDocument;

use crate::domain::search_document::build_search_document;

/// Largest page `list_activities` returns.
pub const MAX_LIST_LIMIT: i64 = 100;
/// Page size used when none is requested.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// One page of activities.
#[derive(Debug, Serialize)]
pub struct ActivityPage {
    /// Activities on this page, ordered by id.
    pub items: Vec<Activity>,
    /// Total number of activities.
    pub total: i64,
    /// Rows skipped before this page.
    pub skip: i64,
    /// Requested page size after clamping.
    pub limit: i64,
}

/// Retrieves an activity by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the activity does not exist.
pub async fn get_activity(id: i64, repo: &dyn ActivityRepository) -> Result<Activity, DomainError> {
    repo.get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("activity", id))
}

/// Lists activities. `limit` is clamped to `1..=100`, `skip` to `>= 0`.
///
/// # Errors
///
/// Returns any repository error.
pub async fn list_activities(
    skip: Option<i64>,
    limit: Option<i64>,
    repo: &dyn ActivityRepository,
) -> Result<ActivityPage, DomainError> {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let (items, total) = repo.list(skip, limit).await?;
    Ok(ActivityPage {
        items,
        total,
        skip,
        limit,
    })
}

/// Builds the current search document for an activity from the activity and
/// its sessions.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the activity does not exist.
pub async fn get_activity_search_document(
    id: i64,
    activities: &dyn ActivityRepository,
    sessions: &dyn SessionRepository,
) -> Result<SearchDocument, DomainError> {
    let activity = get_activity(id, activities).await?;
    let sessions = sessions.list_by_activity(id).await?;
    Ok(build_search_document(&activity, &sessions))
}

/// Retrieves a session by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the session does not exist.
pub async fn get_session(id: i64, repo: &dyn SessionRepository) -> Result<Session, DomainError> {
    repo.get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", id))
}

/// Lists an activity's sessions in schedule order.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the activity does not exist.
pub async fn list_sessions(
    activity_id: i64,
    activities: &dyn ActivityRepository,
    sessions: &dyn SessionRepository,
) -> Result<Vec<Session>, DomainError> {
    get_activity(activity_id, activities).await?;
    sessions.list_by_activity(activity_id).await
}

/// Lists a user's bookings, newest first.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank user id.
pub async fn list_enrollments_by_user(
    user_id: &str,
    repo: &dyn BookingRepository,
) -> Result<Vec<Booking>, DomainError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(DomainError::Validation("user id is required".to_owned()));
    }
    repo.list_by_user(user_id).await
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use sporthub_core::model::session::hhmm;
    use sporthub_core::model::{BookingStatus, NewActivity, NewSession};
    use sporthub_test_support::{
        InMemoryActivityRepository, InMemoryBookingRepository, InMemorySessionRepository,
    };

    use super::*;

    fn new_activity(name: &str) -> NewActivity {
        NewActivity {
            owner_user_id: "7".to_owned(),
            category: "yoga".to_owned(),
            name: name.to_owned(),
            location: "Studio".to_owned(),
            instructor: String::new(),
            base_price: 50.0,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_get_activity_returns_not_found_for_missing_id() {
        let repo = InMemoryActivityRepository::new();

        let result = get_activity(3, &repo).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_activities_clamps_limit() {
        // Arrange
        let repo = InMemoryActivityRepository::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        for i in 0..3 {
            repo.insert(&new_activity(&format!("Yoga {i}")), now)
                .await
                .unwrap();
        }

        // Act
        let page = list_activities(Some(-5), Some(1_000), &repo).await.unwrap();

        // Assert
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, MAX_LIST_LIMIT);
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
    }

    #[tokio::test]
    async fn test_search_document_reflects_sessions() {
        // Arrange
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let activities = InMemoryActivityRepository::new();
        let activity = activities.insert(&new_activity("Yoga"), now).await.unwrap();
        let sessions = InMemorySessionRepository::new();
        sessions
            .insert(
                &NewSession {
                    activity_id: activity.id,
                    date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                    start_time: hhmm::parse("08:00").unwrap(),
                    end_time: hhmm::parse("09:00").unwrap(),
                    capacity: 4,
                },
                now,
            )
            .await
            .unwrap();

        // Act
        let doc = get_activity_search_document(activity.id, &activities, &sessions)
            .await
            .unwrap();

        // Assert
        assert_eq!(doc.id, activity.id.to_string());
        assert_eq!(doc.name, "Yoga");
        assert_eq!(
            doc.start_at.unwrap().to_rfc3339(),
            "2026-03-01T08:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_list_sessions_requires_activity() {
        let activities = InMemoryActivityRepository::new();
        let sessions = InMemorySessionRepository::new();

        let result = list_sessions(9, &activities, &sessions).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "activity",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_list_enrollments_by_user_returns_only_that_user() {
        // Arrange
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let booking = |id: i64, user: &str| Booking {
            id,
            session_id: 1,
            activity_id: 1,
            user_id: user.to_owned(),
            final_price: 95.0,
            status: BookingStatus::Confirmed,
            created_at: now,
        };
        let repo = InMemoryBookingRepository::new()
            .with_booking(booking(1, "u1"))
            .with_booking(booking(2, "u2"))
            .with_booking(booking(3, "u1"));

        // Act
        let bookings = list_enrollments_by_user("u1", &repo).await.unwrap();

        // Assert
        assert_eq!(bookings.len(), 2);
        assert!(bookings.iter().all(|b| b.user_id == "u1"));
        assert_eq!(bookings[0].id, 3);
    }
}
