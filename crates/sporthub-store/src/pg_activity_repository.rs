//! `PostgreSQL` implementation of `ActivityRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sporthub_core::error::DomainError;
use sporthub_core::model::{Activity, ActivityPatch, NewActivity};
use sporthub_core::repository::ActivityRepository;

use crate::storage;

const COLUMNS: &str =
    "id, owner_user_id, category, name, location, instructor, base_price, tags, updated_at";

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    owner_user_id: String,
    category: String,
    name: String,
    location: String,
    instructor: String,
    base_price: f64,
    tags: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            owner_user_id: row.owner_user_id,
            category: row.category,
            name: row.name,
            location: row.location,
            instructor: row.instructor,
            base_price: row.base_price,
            tags: row.tags,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed activity repository.
#[derive(Debug, Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    /// Creates a new `PgActivityRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn insert(&self, new: &NewActivity, now: DateTime<Utc>) -> Result<Activity, DomainError> {
        let row: ActivityRow = sqlx::query_as(&format!(
            "INSERT INTO activities
                (owner_user_id, category, name, location, instructor, base_price, tags,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(&new.owner_user_id)
        .bind(&new.category)
        .bind(&new.name)
        .bind(&new.location)
        .bind(&new.instructor)
        .bind(new.base_price)
        .bind(&new.tags)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to insert activity", &e))?;

        Ok(row.into())
    }

    async fn get(&self, id: i64) -> Result<Option<Activity>, DomainError> {
        let row: Option<ActivityRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM activities WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage("failed to load activity", &e))?;

        Ok(row.map(Activity::from))
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<(Vec<Activity>, i64), DomainError> {
        let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM activities ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list activities", &e))?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage("failed to count activities", &e))?;

        Ok((rows.into_iter().map(Activity::from).collect(), total))
    }

    async fn update(
        &self,
        id: i64,
        patch: &ActivityPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        // NULL parameters leave the column as stored.
        let result = sqlx::query(
            "UPDATE activities SET
                category   = COALESCE($2, category),
                name       = COALESCE($3, name),
                location   = COALESCE($4, location),
                instructor = COALESCE($5, instructor),
                base_price = COALESCE($6, base_price),
                tags       = COALESCE($7, tags),
                updated_at = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.category.as_deref())
        .bind(patch.name.as_deref())
        .bind(patch.location.as_deref())
        .bind(patch.instructor.as_deref())
        .bind(patch.base_price)
        .bind(patch.tags.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to update activity", &e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete activity", &e))?;

        Ok(result.rows_affected() > 0)
    }
}
