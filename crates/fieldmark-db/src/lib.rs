//! # fieldmark-db
//!
//! PostgreSQL + PostGIS persistence layer for fieldmark.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for Track, Note, and Image records, each
//!   insert wrapped in its own narrowly-scoped transaction
//! - Duplicate-key detection mapped to `Error::Duplicate`, the import
//!   pipeline's idempotence mechanism
//! - A pluggable blob storage backend for uploaded files and image payloads
//! - The background job queue table
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fieldmark_db::{Database, FilesystemBackend};
//!
//! let storage = Arc::new(FilesystemBackend::new("/var/fieldmark/blobs"));
//! let db = Database::connect("postgres://localhost/fieldmark", storage).await?;
//! db.run_migrations().await?;
//! ```

pub mod file_storage;
pub mod images;
pub mod jobs;
pub mod notes;
pub mod pool;
pub mod tracks;

use std::sync::Arc;

use fieldmark_core::{Error, Result};

// Re-export core types
pub use fieldmark_core::*;

pub use file_storage::{payload_paths, FilesystemBackend, PayloadPaths, StorageBackend};
pub use images::PgImageRepository;
pub use jobs::PgJobRepository;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tracks::PgTrackRepository;

/// Map an insert error, turning uniqueness-constraint violations into
/// [`Error::Duplicate`].
///
/// Duplicates are expected under retries and concurrent runs of the import
/// pipeline and must stay distinguishable from real persistence failures.
pub(crate) fn map_db_err(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db_err) = e {
        if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return Error::Duplicate(db_err.message().to_string());
        }
    }
    Error::Database(e)
}

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Track repository.
    pub tracks: Arc<PgTrackRepository>,
    /// Note repository.
    pub notes: Arc<PgNoteRepository>,
    /// Image repository (rows + payload blobs).
    pub images: Arc<PgImageRepository>,
    /// Job queue repository.
    pub jobs: Arc<PgJobRepository>,
}

impl Database {
    /// Connect with default pool configuration and build all repositories.
    pub async fn connect(database_url: &str, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool, storage))
    }

    /// Build the repository set over an existing pool.
    pub fn from_pool(
        pool: sqlx::Pool<sqlx::Postgres>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            tracks: Arc::new(PgTrackRepository::new(pool.clone())),
            notes: Arc::new(PgNoteRepository::new(pool.clone())),
            images: Arc::new(PgImageRepository::new(pool.clone(), storage)),
            jobs: Arc::new(PgJobRepository::new(pool.clone())),
            pool,
        }
    }

    /// Apply pending schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Config(format!("Migration failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_db_err_passes_through_non_database_errors() {
        let err = map_db_err(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_duplicate());
    }
}
