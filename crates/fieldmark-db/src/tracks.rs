//! Track repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use fieldmark_core::{NewTrack, Result, TrackRepository};

use crate::map_db_err;

/// PostgreSQL implementation of [`TrackRepository`].
///
/// The `(owner_id, started_at)` unique constraint makes re-imports of the
/// same track surface as `Error::Duplicate` rather than duplicate rows.
pub struct PgTrackRepository {
    pool: Pool<Postgres>,
}

impl PgTrackRepository {
    /// Create a new PgTrackRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for PgTrackRepository {
    async fn insert(&self, track: NewTrack) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO track (id, owner_id, text, started_at, ended_at, length_m, line, modified_at)
             VALUES ($1, $2, $3, $4, $5, $6, ST_GeomFromText($7, 4326), now())",
        )
        .bind(id)
        .bind(track.owner_id)
        .bind(&track.text)
        .bind(track.started_at)
        .bind(track.ended_at)
        .bind(track.length_m)
        .bind(track.line.to_wkt())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await?;
        Ok(id)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM track WHERE modified_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
