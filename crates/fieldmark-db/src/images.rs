//! Image repository implementation.
//!
//! An image row and its three payload blobs are committed as a unit: blobs
//! are written to storage first, and if the row insert then fails for any
//! reason (duplicate included) the blobs are removed again, so storage
//! never accumulates payloads without a row pointing at them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::warn;
use uuid::Uuid;

use fieldmark_core::{Error, ImageRepository, NewImage, Result};

use crate::file_storage::{payload_paths, StorageBackend};
use crate::map_db_err;

/// PostgreSQL implementation of [`ImageRepository`].
pub struct PgImageRepository {
    pool: Pool<Postgres>,
    storage: Arc<dyn StorageBackend>,
}

impl PgImageRepository {
    /// Create a new PgImageRepository with the given pool and blob storage.
    pub fn new(pool: Pool<Postgres>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { pool, storage }
    }

    /// Remove already-written payload blobs after a failed row insert.
    async fn discard_payloads(&self, paths: &[&str]) {
        for path in paths {
            if let Err(e) = self.storage.delete(path).await {
                warn!(
                    subsystem = "db",
                    component = "images",
                    storage_path = %path,
                    error = %e,
                    "Failed to remove orphaned payload blob"
                );
            }
        }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn insert(&self, image: NewImage) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let paths = payload_paths(&id);

        self.storage.write(&paths.image, &image.payload.image).await?;
        self.storage
            .write(&paths.thumbnail, &image.payload.thumbnail)
            .await?;
        self.storage
            .write(&paths.web_image, &image.payload.web_image)
            .await?;

        let insert = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "INSERT INTO image (id, owner_id, note_id, taken_at, location, altitude, azimuth,
                                    image_path, thumbnail_path, web_image_path, modified_at)
                 VALUES ($1, $2, $3, $4, ST_GeomFromText($5, 4326), $6, $7, $8, $9, $10, now())",
            )
            .bind(id)
            .bind(image.owner_id)
            .bind(image.note_id)
            .bind(image.taken_at)
            .bind(image.location.to_wkt())
            .bind(image.altitude)
            .bind(image.azimuth)
            .bind(&paths.image)
            .bind(&paths.thumbnail)
            .bind(&paths.web_image)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
            tx.commit().await?;
            Ok::<_, Error>(())
        };

        if let Err(e) = insert.await {
            self.discard_payloads(&[
                paths.image.as_str(),
                paths.thumbnail.as_str(),
                paths.web_image.as_str(),
            ])
            .await;
            return Err(e);
        }

        Ok(id)
    }

    async fn payload_paths_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        // Includes images swept directly and images cascaded away with an
        // old note; the SQL cascade cannot reach into blob storage.
        let rows = sqlx::query(
            "SELECT i.image_path, i.thumbnail_path, i.web_image_path
             FROM image i
             JOIN note n ON n.id = i.note_id
             WHERE i.modified_at < $1 OR n.modified_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut paths = Vec::with_capacity(rows.len() * 3);
        for row in rows {
            paths.push(row.try_get::<String, _>("image_path")?);
            paths.push(row.try_get::<String, _>("thumbnail_path")?);
            paths.push(row.try_get::<String, _>("web_image_path")?);
        }
        Ok(paths)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM image WHERE modified_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
