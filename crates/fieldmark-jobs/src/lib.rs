//! # fieldmark-jobs
//!
//! Background job system and project import pipeline for fieldmark.
//!
//! This crate provides:
//! - The project import pipeline: source reader, image normalizer, and the
//!   import coordinator
//! - A polling job worker dispatching queued jobs to registered handlers
//! - The retention sweep handler
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fieldmark_db::{Database, FilesystemBackend, StorageBackend};
//! use fieldmark_jobs::{
//!     JobWorker, ProjectImportHandler, ProjectImporter, WorkerConfig,
//! };
//!
//! let storage: Arc<dyn StorageBackend> = Arc::new(FilesystemBackend::new("/var/fieldmark"));
//! let db = Database::connect("postgres://...", storage.clone()).await?;
//!
//! let importer = ProjectImporter::new(
//!     storage.clone(),
//!     db.tracks.clone(),
//!     db.notes.clone(),
//!     db.images.clone(),
//! );
//! let worker = JobWorker::new(db.jobs.clone(), WorkerConfig::from_env())
//!     .with_handler(Arc::new(ProjectImportHandler::new(importer)));
//!
//! let handle = worker.start();
//! // ... later
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod import;
pub mod import_handler;
pub mod normalize;
pub mod retention;
pub mod source;
pub mod worker;

// Re-export core types
pub use fieldmark_core::*;

pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use import::ProjectImporter;
pub use import_handler::ProjectImportHandler;
pub use normalize::{normalize, NormalizedImage};
pub use retention::RetentionHandler;
pub use source::{ImageRecord, NoteRecord, ProjectSource, SourcePoint, TrackLogRecord};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};
