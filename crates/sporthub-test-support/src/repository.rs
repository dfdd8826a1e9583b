//! In-memory repositories for handler and route tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sporthub_core::error::DomainError;
use sporthub_core::model::{
    Activity, ActivityPatch, Booking, BookingStatus, NewActivity, NewBooking, NewSession, Session,
    SessionPatch,
};
use sporthub_core::repository::{ActivityRepository, BookingRepository, SessionRepository};

#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Activity storage backed by a `BTreeMap`; ids start at 1.
#[derive(Debug, Default)]
pub struct InMemoryActivityRepository {
    table: Mutex<Table<Activity>>,
}

impl InMemoryActivityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `activity` under its own id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_activity(self, activity: Activity) -> Self {
        {
            let mut table = self.table.lock().unwrap();
            table.next_id = table.next_id.max(activity.id + 1);
            table.rows.insert(activity.id, activity);
        }
        self
    }
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn insert(&self, new: &NewActivity, now: DateTime<Utc>) -> Result<Activity, DomainError> {
        let mut table = self.table.lock().unwrap();
        let id = table.allocate();
        let activity = Activity {
            id,
            owner_user_id: new.owner_user_id.clone(),
            category: new.category.clone(),
            name: new.name.clone(),
            location: new.location.clone(),
            instructor: new.instructor.clone(),
            base_price: new.base_price,
            tags: new.tags.clone(),
            updated_at: now,
        };
        table.rows.insert(id, activity.clone());
        Ok(activity)
    }

    async fn get(&self, id: i64) -> Result<Option<Activity>, DomainError> {
        Ok(self.table.lock().unwrap().rows.get(&id).cloned())
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<(Vec<Activity>, i64), DomainError> {
        let table = self.table.lock().unwrap();
        let total = i64::try_from(table.rows.len()).unwrap_or(i64::MAX);
        let page = table
            .rows
            .values()
            .skip(usize::try_from(skip).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: i64,
        patch: &ActivityPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut table = self.table.lock().unwrap();
        let Some(activity) = table.rows.get_mut(&id) else {
            return Ok(false);
        };
        patch.apply_to(activity);
        activity.updated_at = now;
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        Ok(self.table.lock().unwrap().rows.remove(&id).is_some())
    }
}

/// An activity repository whose every call fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingActivityRepository;

#[async_trait]
impl ActivityRepository for FailingActivityRepository {
    async fn insert(
        &self,
        _new: &NewActivity,
        _now: DateTime<Utc>,
    ) -> Result<Activity, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get(&self, _id: i64) -> Result<Option<Activity>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list(&self, _skip: i64, _limit: i64) -> Result<(Vec<Activity>, i64), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn update(
        &self,
        _id: i64,
        _patch: &ActivityPatch,
        _now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn delete(&self, _id: i64) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Session storage backed by a `BTreeMap`; ids start at 1.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    table: Mutex<Table<Session>>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `session` under its own id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        {
            let mut table = self.table.lock().unwrap();
            table.next_id = table.next_id.max(session.id + 1);
            table.rows.insert(session.id, session);
        }
        self
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, new: &NewSession, now: DateTime<Utc>) -> Result<Session, DomainError> {
        let mut table = self.table.lock().unwrap();
        let id = table.allocate();
        let session = Session {
            id,
            activity_id: new.activity_id,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            capacity: new.capacity,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: i64) -> Result<Option<Session>, DomainError> {
        Ok(self.table.lock().unwrap().rows.get(&id).cloned())
    }

    async fn list_by_activity(&self, activity_id: i64) -> Result<Vec<Session>, DomainError> {
        let table = self.table.lock().unwrap();
        let mut sessions: Vec<Session> = table
            .rows
            .values()
            .filter(|s| s.activity_id == activity_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.date, s.start_time));
        Ok(sessions)
    }

    async fn update(
        &self,
        id: i64,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut table = self.table.lock().unwrap();
        let Some(session) = table.rows.get_mut(&id) else {
            return Ok(false);
        };
        let mut merged = patch.merge(session)?;
        merged.updated_at = now;
        *session = merged;
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        Ok(self.table.lock().unwrap().rows.remove(&id).is_some())
    }
}

/// Booking storage backed by a `BTreeMap`; ids start at 1.
///
/// `insert_confirmed` checks and inserts under one lock, so concurrent
/// enrollments observe the same guarantees as the Postgres store. An optional
/// delay on `count_confirmed` simulates a slow database.
#[derive(Debug, Default)]
pub struct InMemoryBookingRepository {
    table: Mutex<Table<Booking>>,
    count_delay: Option<Duration>,
}

impl InMemoryBookingRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `count_confirmed` call sleep for `delay` first.
    #[must_use]
    pub fn with_count_delay(mut self, delay: Duration) -> Self {
        self.count_delay = Some(delay);
        self
    }

    /// Stores `booking` under its own id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_booking(self, booking: Booking) -> Self {
        {
            let mut table = self.table.lock().unwrap();
            table.next_id = table.next_id.max(booking.id + 1);
            table.rows.insert(booking.id, booking);
        }
        self
    }

    /// Returns a snapshot of every stored booking.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn bookings(&self) -> Vec<Booking> {
        self.table.lock().unwrap().rows.values().cloned().collect()
    }
}

fn confirmed_for(rows: &BTreeMap<i64, Booking>, session_id: i64) -> impl Iterator<Item = &Booking> {
    rows.values()
        .filter(move |b| b.session_id == session_id && b.status == BookingStatus::Confirmed)
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn get(&self, id: i64) -> Result<Option<Booking>, DomainError> {
        Ok(self.table.lock().unwrap().rows.get(&id).cloned())
    }

    async fn exists_confirmed(&self, user_id: &str, session_id: i64) -> Result<bool, DomainError> {
        let table = self.table.lock().unwrap();
        Ok(confirmed_for(&table.rows, session_id).any(|b| b.user_id == user_id))
    }

    async fn count_confirmed(&self, session_id: i64) -> Result<i64, DomainError> {
        if let Some(delay) = self.count_delay {
            tokio::time::sleep(delay).await;
        }
        let table = self.table.lock().unwrap();
        let count = confirmed_for(&table.rows, session_id).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_confirmed(
        &self,
        new: &NewBooking,
        capacity: i32,
    ) -> Result<Booking, DomainError> {
        let mut table = self.table.lock().unwrap();
        if confirmed_for(&table.rows, new.session_id).any(|b| b.user_id == new.user_id) {
            return Err(DomainError::DuplicateBooking {
                user_id: new.user_id.clone(),
                session_id: new.session_id,
            });
        }
        let taken = confirmed_for(&table.rows, new.session_id).count();
        if i64::try_from(taken).unwrap_or(i64::MAX) >= i64::from(capacity) {
            return Err(DomainError::NoCapacity {
                session_id: new.session_id,
                capacity,
            });
        }
        let id = table.allocate();
        let booking = Booking {
            id,
            session_id: new.session_id,
            activity_id: new.activity_id,
            user_id: new.user_id.clone(),
            final_price: new.final_price,
            status: BookingStatus::Confirmed,
            created_at: new.created_at,
        };
        table.rows.insert(id, booking.clone());
        Ok(booking)
    }

    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, DomainError> {
        let mut table = self.table.lock().unwrap();
        match table.rows.get_mut(&id) {
            Some(booking) if booking.status == from => {
                booking.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, DomainError> {
        let table = self.table.lock().unwrap();
        let mut bookings: Vec<Booking> = table
            .rows
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }
}
