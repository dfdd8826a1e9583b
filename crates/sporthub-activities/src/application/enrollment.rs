//! Enrollment: concurrent pricing and capacity check, then an atomic commit.

use std::time::Duration;

use sporthub_core::clock::Clock;
use sporthub_core::error::DomainError;
use sporthub_core::event::{BookingEvent, BookingEventOp, routing};
use sporthub_core::model::{Booking, BookingStatus, NewBooking, Session};
use sporthub_core::publisher::{EventPublisher, publish_best_effort};
use sporthub_core::repository::{ActivityRepository, BookingRepository, SessionRepository};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::domain::commands::{CancelEnrollment, Enroll};
use crate::domain::pricing::compute_final_price;

/// Default bound on each concurrent enrollment branch.
pub const DEFAULT_BRANCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Repositories the enrollment flow reads and writes.
#[derive(Clone, Copy)]
pub struct EnrollmentStores<'a> {
    pub activities: &'a dyn ActivityRepository,
    pub sessions: &'a dyn SessionRepository,
    pub bookings: &'a dyn BookingRepository,
}

async fn price_branch(
    activities: &dyn ActivityRepository,
    session: &Session,
) -> Result<f64, DomainError> {
    let activity = activities
        .get(session.activity_id)
        .await?
        .ok_or_else(|| DomainError::not_found("activity", session.activity_id))?;
    Ok(compute_final_price(activity.base_price, &session.start_hhmm()))
}

async fn capacity_branch(
    bookings: &dyn BookingRepository,
    session: &Session,
) -> Result<(), DomainError> {
    let taken = bookings.count_confirmed(session.id).await?;
    if taken >= i64::from(session.capacity) {
        return Err(DomainError::NoCapacity {
            session_id: session.id,
            capacity: session.capacity,
        });
    }
    Ok(())
}

/// Handles the `Enroll` command.
///
/// After the duplicate check, the price and the remaining capacity are
/// computed concurrently, each bounded by `branch_timeout`. The booking is then
/// committed through `BookingRepository::insert_confirmed`, which re-checks
/// both rules atomically, and `booking.created` is published.
///
/// # Errors
///
/// - `DomainError::NotFound` if the session or its activity does not exist.
/// - `DomainError::DuplicateBooking` if the user already holds a confirmed booking.
/// - `DomainError::NoCapacity` if the session is full.
/// - `DomainError::Timeout` if either branch exceeds `branch_timeout`.
#[instrument(skip_all, fields(session_id = command.session_id, user_id = %command.user_id))]
pub async fn handle_enroll(
    command: &Enroll,
    clock: &dyn Clock,
    stores: EnrollmentStores<'_>,
    publisher: &dyn EventPublisher,
    branch_timeout: Duration,
) -> Result<Booking, DomainError> {
    if command.user_id.trim().is_empty() {
        return Err(DomainError::Validation("user id is required".to_owned()));
    }
    let session = stores
        .sessions
        .get(command.session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", command.session_id))?;

    if stores
        .bookings
        .exists_confirmed(&command.user_id, session.id)
        .await?
    {
        return Err(DomainError::DuplicateBooking {
            user_id: command.user_id.clone(),
            session_id: session.id,
        });
    }

    let (price, capacity) = tokio::join!(
        timeout(branch_timeout, price_branch(stores.activities, &session)),
        timeout(branch_timeout, capacity_branch(stores.bookings, &session)),
    );
    let final_price = price.map_err(|_| DomainError::Timeout("computing the price"))??;
    capacity.map_err(|_| DomainError::Timeout("checking capacity"))??;

    let new = NewBooking {
        session_id: session.id,
        activity_id: session.activity_id,
        user_id: command.user_id.clone(),
        final_price,
        created_at: clock.now(),
    };
    let booking = stores
        .bookings
        .insert_confirmed(&new, session.capacity)
        .await?;
    info!(
        correlation_id = %command.correlation_id,
        booking_id = booking.id,
        final_price,
        "enrollment confirmed"
    );

    let event = booking_event(BookingEventOp::Created, &booking, clock);
    publish_best_effort(publisher, routing::BOOKING_CREATED, &event).await;
    Ok(booking)
}

/// Handles the `CancelEnrollment` command: only the booking owner or an admin
/// may cancel, and only a confirmed booking can be cancelled.
///
/// # Errors
///
/// - `DomainError::NotFound` if the booking does not exist.
/// - `DomainError::Forbidden` if the requester is neither owner nor admin.
/// - `DomainError::InvalidTransition` if the booking is not confirmed.
pub async fn handle_cancel_enrollment(
    command: &CancelEnrollment,
    clock: &dyn Clock,
    bookings: &dyn BookingRepository,
    publisher: &dyn EventPublisher,
) -> Result<Booking, DomainError> {
    let booking = bookings
        .get(command.booking_id)
        .await?
        .ok_or_else(|| DomainError::not_found("booking", command.booking_id))?;

    if !command.requester_is_admin && booking.user_id != command.requester_id {
        warn!(
            correlation_id = %command.correlation_id,
            booking_id = booking.id,
            requester_id = %command.requester_id,
            "cancellation refused"
        );
        return Err(DomainError::Forbidden(
            "only the booking owner or an admin may cancel".to_owned(),
        ));
    }

    let next = booking.status.transition_to(BookingStatus::Cancelled)?;
    if !bookings.update_status(booking.id, booking.status, next).await? {
        // Lost a race with another cancellation.
        let current = bookings
            .get(booking.id)
            .await?
            .ok_or_else(|| DomainError::not_found("booking", booking.id))?;
        return Err(DomainError::InvalidTransition {
            from: current.status.as_str(),
            to: next.as_str(),
        });
    }

    let cancelled = Booking {
        status: next,
        ..booking
    };
    info!(
        correlation_id = %command.correlation_id,
        booking_id = cancelled.id,
        "enrollment cancelled"
    );
    let event = booking_event(BookingEventOp::Cancelled, &cancelled, clock);
    publish_best_effort(publisher, routing::BOOKING_CANCELLED, &event).await;
    Ok(cancelled)
}

fn booking_event(op: BookingEventOp, booking: &Booking, clock: &dyn Clock) -> BookingEvent {
    BookingEvent {
        op,
        booking_id: booking.id,
        session_id: booking.session_id,
        activity_id: booking.activity_id,
        user_id: booking.user_id.clone(),
        final_price: booking.final_price,
        timestamp: clock.now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use sporthub_core::model::session::hhmm;
    use sporthub_core::model::{Activity, Booking, BookingStatus, Session};
    use sporthub_test_support::{
        FixedClock, InMemoryActivityRepository, InMemoryBookingRepository,
        InMemorySessionRepository, RecordingPublisher,
    };
    use uuid::Uuid;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn activity(base_price: f64) -> Activity {
        Activity {
            id: 1,
            owner_user_id: "admin".to_owned(),
            category: "football".to_owned(),
            name: "Futbol 5".to_owned(),
            location: "Club Norte".to_owned(),
            instructor: String::new(),
            base_price,
            tags: Vec::new(),
            updated_at: now(),
        }
    }

    fn session(start: &str, capacity: i32) -> Session {
        Session {
            id: 10,
            activity_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            start_time: hhmm::parse(start).unwrap(),
            end_time: hhmm::parse("23:00").unwrap(),
            capacity,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn confirmed(id: i64, user_id: &str) -> Booking {
        Booking {
            id,
            session_id: 10,
            activity_id: 1,
            user_id: user_id.to_owned(),
            final_price: 95.0,
            status: BookingStatus::Confirmed,
            created_at: now(),
        }
    }

    fn enroll(user_id: &str) -> Enroll {
        Enroll {
            correlation_id: Uuid::new_v4(),
            session_id: 10,
            user_id: user_id.to_owned(),
        }
    }

    struct Fixture {
        activities: InMemoryActivityRepository,
        sessions: InMemorySessionRepository,
        bookings: InMemoryBookingRepository,
        publisher: RecordingPublisher,
    }

    impl Fixture {
        fn new(start: &str, capacity: i32, bookings: InMemoryBookingRepository) -> Self {
            Self {
                activities: InMemoryActivityRepository::new().with_activity(activity(100.0)),
                sessions: InMemorySessionRepository::new().with_session(session(start, capacity)),
                bookings,
                publisher: RecordingPublisher::new(),
            }
        }

        fn stores(&self) -> EnrollmentStores<'_> {
            EnrollmentStores {
                activities: &self.activities,
                sessions: &self.sessions,
                bookings: &self.bookings,
            }
        }

        async fn enroll(&self, user_id: &str) -> Result<Booking, DomainError> {
            handle_enroll(
                &enroll(user_id),
                &FixedClock(now()),
                self.stores(),
                &self.publisher,
                DEFAULT_BRANCH_TIMEOUT,
            )
            .await
        }
    }

    #[tokio::test]
    async fn test_enroll_in_peak_session_prices_with_surcharge() {
        // Arrange
        let fixture = Fixture::new("19:00", 5, InMemoryBookingRepository::new());

        // Act
        let booking = fixture.enroll("u1").await.unwrap();

        // Assert
        assert!((booking.final_price - 104.5).abs() < 1e-9);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        let published = fixture.publisher.published();
        assert_eq!(published[0].0, "booking.created");
        assert_eq!(published[0].1["op"], "created");
        assert_eq!(published[0].1["userId"], "u1");
    }

    #[tokio::test]
    async fn test_enroll_in_off_peak_session_only_discounts() {
        // Arrange
        let fixture = Fixture::new("10:00", 5, InMemoryBookingRepository::new());

        // Act
        let booking = fixture.enroll("u1").await.unwrap();

        // Assert
        assert!((booking.final_price - 95.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_enroll_in_full_session_fails_with_no_capacity() {
        // Arrange
        let bookings = InMemoryBookingRepository::new()
            .with_booking(confirmed(1, "a"))
            .with_booking(confirmed(2, "b"));
        let fixture = Fixture::new("10:00", 2, bookings);

        // Act
        let result = fixture.enroll("c").await;

        // Assert
        assert!(matches!(
            result,
            Err(DomainError::NoCapacity {
                session_id: 10,
                capacity: 2
            })
        ));
        assert_eq!(fixture.bookings.bookings().len(), 2);
        assert!(fixture.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_fails_and_creates_nothing() {
        // Arrange
        let bookings = InMemoryBookingRepository::new().with_booking(confirmed(1, "u1"));
        let fixture = Fixture::new("10:00", 5, bookings);

        // Act
        let result = fixture.enroll("u1").await;

        // Assert
        assert!(matches!(result, Err(DomainError::DuplicateBooking { .. })));
        assert_eq!(fixture.bookings.bookings().len(), 1);
    }

    #[tokio::test]
    async fn test_user_with_cancelled_booking_can_enroll_again() {
        // Arrange
        let mut cancelled = confirmed(1, "u1");
        cancelled.status = BookingStatus::Cancelled;
        let bookings = InMemoryBookingRepository::new().with_booking(cancelled);
        let fixture = Fixture::new("10:00", 1, bookings);

        // Act
        let result = fixture.enroll("u1").await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_enroll_in_missing_session_is_not_found() {
        // Arrange
        let fixture = Fixture::new("10:00", 5, InMemoryBookingRepository::new());
        let command = Enroll {
            session_id: 999,
            ..enroll("u1")
        };

        // Act
        let result = handle_enroll(
            &command,
            &FixedClock(now()),
            fixture.stores(),
            &fixture.publisher,
            DEFAULT_BRANCH_TIMEOUT,
        )
        .await;

        // Assert
        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "session",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_slow_capacity_branch_times_out() {
        // Arrange
        let bookings =
            InMemoryBookingRepository::new().with_count_delay(Duration::from_millis(200));
        let fixture = Fixture::new("10:00", 5, bookings);

        // Act
        let result = handle_enroll(
            &enroll("u1"),
            &FixedClock(now()),
            fixture.stores(),
            &fixture.publisher,
            Duration::from_millis(20),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Timeout("checking capacity"))));
        assert!(fixture.bookings.bookings().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_never_exceed_capacity() {
        // Arrange
        let fixture = Arc::new(Fixture::new("10:00", 3, InMemoryBookingRepository::new()));
        let mut handles = Vec::new();
        for i in 0..10 {
            let fixture = Arc::clone(&fixture);
            handles.push(tokio::spawn(async move {
                fixture.enroll(&format!("user-{i}")).await
            }));
        }

        // Act
        let mut confirmed_count = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                confirmed_count += 1;
            }
        }

        // Assert
        assert_eq!(confirmed_count, 3);
        assert_eq!(fixture.bookings.bookings().len(), 3);
    }

    #[tokio::test]
    async fn test_owner_can_cancel_confirmed_booking() {
        // Arrange
        let bookings = InMemoryBookingRepository::new().with_booking(confirmed(1, "u1"));
        let publisher = RecordingPublisher::new();
        let command = CancelEnrollment {
            correlation_id: Uuid::new_v4(),
            booking_id: 1,
            requester_id: "u1".to_owned(),
            requester_is_admin: false,
        };

        // Act
        let cancelled =
            handle_cancel_enrollment(&command, &FixedClock(now()), &bookings, &publisher)
                .await
                .unwrap();

        // Assert
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(publisher.routing_keys(), vec!["booking.cancelled"]);
        assert_eq!(publisher.published()[0].1["op"], "cancelled");
    }

    #[tokio::test]
    async fn test_admin_can_cancel_any_booking() {
        // Arrange
        let bookings = InMemoryBookingRepository::new().with_booking(confirmed(1, "u1"));
        let command = CancelEnrollment {
            correlation_id: Uuid::new_v4(),
            booking_id: 1,
            requester_id: "root".to_owned(),
            requester_is_admin: true,
        };

        // Act
        let result = handle_cancel_enrollment(
            &command,
            &FixedClock(now()),
            &bookings,
            &RecordingPublisher::new(),
        )
        .await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_owner_cancel_is_forbidden_and_leaves_status() {
        // Arrange
        let bookings = InMemoryBookingRepository::new().with_booking(confirmed(1, "u1"));
        let publisher = RecordingPublisher::new();
        let command = CancelEnrollment {
            correlation_id: Uuid::new_v4(),
            booking_id: 1,
            requester_id: "u2".to_owned(),
            requester_is_admin: false,
        };

        // Act
        let result =
            handle_cancel_enrollment(&command, &FixedClock(now()), &bookings, &publisher).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
        assert_eq!(bookings.bookings()[0].status, BookingStatus::Confirmed);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_cancelling_twice_is_an_invalid_transition() {
        // Arrange
        let bookings = InMemoryBookingRepository::new().with_booking(confirmed(1, "u1"));
        let command = CancelEnrollment {
            correlation_id: Uuid::new_v4(),
            booking_id: 1,
            requester_id: "u1".to_owned(),
            requester_is_admin: false,
        };
        let publisher = RecordingPublisher::new();
        handle_cancel_enrollment(&command, &FixedClock(now()), &bookings, &publisher)
            .await
            .unwrap();

        // Act
        let result =
            handle_cancel_enrollment(&command, &FixedClock(now()), &bookings, &publisher).await;

        // Assert
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                from: "cancelled",
                to: "cancelled"
            })
        ));
    }
}
