//! `PostgreSQL` implementation of `SessionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;

use sporthub_core::error::DomainError;
use sporthub_core::model::{NewSession, Session, SessionPatch};
use sporthub_core::repository::SessionRepository;

use crate::storage;

const COLUMNS: &str =
    "id, activity_id, date, start_time, end_time, capacity, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    activity_id: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    capacity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            activity_id: row.activity_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            capacity: row.capacity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed session repository.
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Creates a new `PgSessionRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, new: &NewSession, now: DateTime<Utc>) -> Result<Session, DomainError> {
        let row: SessionRow = sqlx::query_as(&format!(
            "INSERT INTO sessions
                (activity_id, date, start_time, end_time, capacity, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(new.activity_id)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.capacity)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to insert session", &e))?;

        Ok(row.into())
    }

    async fn get(&self, id: i64) -> Result<Option<Session>, DomainError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM sessions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage("failed to load session", &e))?;

        Ok(row.map(Session::from))
    }

    async fn list_by_activity(&self, activity_id: i64) -> Result<Vec<Session>, DomainError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE activity_id = $1
             ORDER BY date, start_time, id"
        ))
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list sessions", &e))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn update(
        &self,
        id: i64,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE sessions SET
                date       = COALESCE($2, date),
                start_time = COALESCE($3, start_time),
                end_time   = COALESCE($4, end_time),
                capacity   = COALESCE($5, capacity),
                updated_at = $6
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.date)
        .bind(patch.start_time)
        .bind(patch.end_time)
        .bind(patch.capacity)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to update session", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete session", &e))?;

        Ok(result.rows_affected() > 0)
    }
}
