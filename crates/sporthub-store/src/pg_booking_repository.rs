//! `PostgreSQL` implementation of `BookingRepository`.
//!
//! `insert_confirmed` locks the session row with `SELECT ... FOR UPDATE`, so
//! concurrent enrollments for one session serialize on that lock and the
//! capacity check and insert commit together. The partial unique index on
//! `(user_id, session_id) WHERE status = 'confirmed'` backs the duplicate rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use sporthub_core::error::DomainError;
use sporthub_core::model::{Booking, BookingStatus, NewBooking};
use sporthub_core::repository::BookingRepository;

use crate::storage;

const COLUMNS: &str = "id, session_id, activity_id, user_id, final_price, status, created_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    session_id: i64,
    activity_id: i64,
    user_id: String,
    final_price: f64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DomainError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            activity_id: row.activity_id,
            user_id: row.user_id,
            final_price: row.final_price,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed booking repository.
#[derive(Debug, Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Creates a new `PgBookingRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get(&self, id: i64) -> Result<Option<Booking>, DomainError> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage("failed to load booking", &e))?;

        row.map(Booking::try_from).transpose()
    }

    async fn exists_confirmed(&self, user_id: &str, session_id: i64) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE user_id = $1 AND session_id = $2 AND status = 'confirmed'
             )",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to check booking", &e))?;

        Ok(exists)
    }

    async fn count_confirmed(&self, session_id: i64) -> Result<i64, DomainError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE session_id = $1 AND status = 'confirmed'",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to count bookings", &e))?;

        Ok(count)
    }

    async fn insert_confirmed(
        &self,
        new: &NewBooking,
        capacity: i32,
    ) -> Result<Booking, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("failed to begin transaction", &e))?;

        let locked: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE id = $1 FOR UPDATE")
                .bind(new.session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| storage("failed to lock session", &e))?;
        if locked.is_none() {
            return Err(DomainError::not_found("session", new.session_id));
        }

        let (duplicate, confirmed): (bool, i64) = sqlx::query_as(
            "SELECT
                COALESCE(BOOL_OR(user_id = $2), FALSE),
                COUNT(*)
             FROM bookings
             WHERE session_id = $1 AND status = 'confirmed'",
        )
        .bind(new.session_id)
        .bind(&new.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage("failed to count bookings", &e))?;

        if duplicate {
            return Err(DomainError::DuplicateBooking {
                user_id: new.user_id.clone(),
                session_id: new.session_id,
            });
        }
        if confirmed >= i64::from(capacity) {
            return Err(DomainError::NoCapacity {
                session_id: new.session_id,
                capacity,
            });
        }

        let row: BookingRow = sqlx::query_as(&format!(
            "INSERT INTO bookings
                (session_id, activity_id, user_id, final_price, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(new.session_id)
        .bind(new.activity_id)
        .bind(&new.user_id)
        .bind(new.final_price)
        .bind(BookingStatus::Confirmed.as_str())
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::DuplicateBooking {
                    user_id: new.user_id.clone(),
                    session_id: new.session_id,
                }
            } else {
                storage("failed to insert booking", &e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| storage("failed to commit booking", &e))?;

        debug!(
            booking_id = row.id,
            session_id = new.session_id,
            confirmed = confirmed + 1,
            capacity,
            "booking committed"
        );
        Booking::try_from(row)
    }

    async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to update booking status", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, DomainError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM bookings
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list bookings", &e))?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
