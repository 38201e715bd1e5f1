//! Note repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use fieldmark_core::{NewNote, NoteRepository, Result};

use crate::map_db_err;

/// PostgreSQL implementation of [`NoteRepository`].
///
/// Notes are inserted before their images so the images can reference the
/// assigned id. `(owner_id, taken_at)` is unique; a duplicate note means
/// the note and its images were already imported by an earlier run.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, note: NewNote) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO note (id, owner_id, description, text, form, taken_at, location, altitude, modified_at)
             VALUES ($1, $2, $3, $4, $5, $6, ST_GeomFromText($7, 4326), $8, now())",
        )
        .bind(id)
        .bind(note.owner_id)
        .bind(&note.description)
        .bind(&note.text)
        .bind(&note.form)
        .bind(note.taken_at)
        .bind(note.location.to_wkt())
        .bind(note.altitude)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await?;
        Ok(id)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        // Image rows go with their note via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM note WHERE modified_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
