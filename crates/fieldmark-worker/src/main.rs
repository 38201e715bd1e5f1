//! fieldmark-worker - background worker for the fieldmark ingest service.
//!
//! Connects to the database, wires up blob storage, registers the job
//! handlers, and runs the worker loop until SIGINT.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fieldmark_core::defaults;
use fieldmark_db::{Database, FilesystemBackend, StorageBackend};
use fieldmark_jobs::{
    JobWorker, ProjectImportHandler, ProjectImporter, RetentionHandler, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let storage_root =
        std::env::var("FIELDMARK_STORAGE_ROOT").unwrap_or_else(|_| "./data".to_string());
    let retain_days = std::env::var("RETAIN_DAYS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(defaults::RETAIN_DAYS);

    let backend = FilesystemBackend::new(&storage_root);
    backend
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!("Storage backend failed validation: {}", e))?;
    let storage: Arc<dyn StorageBackend> = Arc::new(backend);

    let db = Database::connect(&database_url, storage.clone()).await?;
    db.run_migrations().await?;

    let importer = ProjectImporter::new(
        storage.clone(),
        db.tracks.clone(),
        db.notes.clone(),
        db.images.clone(),
    );

    let worker = JobWorker::new(db.jobs.clone(), WorkerConfig::from_env())
        .with_handler(Arc::new(ProjectImportHandler::new(importer)))
        .with_handler(Arc::new(RetentionHandler::new(
            db.tracks.clone(),
            db.notes.clone(),
            db.images.clone(),
            storage,
            retain_days,
        )));
    let handle = worker.start();

    info!(
        subsystem = "jobs",
        component = "worker",
        storage_root = %storage_root,
        retain_days,
        "fieldmark worker running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await?;

    Ok(())
}
