//! Scheduled retention sweep.
//!
//! Prunes Track, Note, and Image records older than the configured day
//! count. Runs on a schedule driven by the queue (one `retention` job per
//! sweep). Payload blob paths are collected before any rows go, because
//! the note→image cascade happens inside the database and cannot reach
//! into blob storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use fieldmark_core::{ImageRepository, JobType, NoteRepository, TrackRepository};
use fieldmark_db::StorageBackend;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Payload of a `retention` job.
#[derive(Debug, Default, Deserialize)]
struct RetentionPayload {
    /// Override for the retention window in days.
    retain_days: Option<i64>,
}

/// Handler for [`JobType::Retention`] jobs.
pub struct RetentionHandler {
    tracks: Arc<dyn TrackRepository>,
    notes: Arc<dyn NoteRepository>,
    images: Arc<dyn ImageRepository>,
    storage: Arc<dyn StorageBackend>,
    retain_days: i64,
}

impl RetentionHandler {
    /// Create a new retention handler with the given default window.
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        notes: Arc<dyn NoteRepository>,
        images: Arc<dyn ImageRepository>,
        storage: Arc<dyn StorageBackend>,
        retain_days: i64,
    ) -> Self {
        Self {
            tracks,
            notes,
            images,
            storage,
            retain_days,
        }
    }
}

#[async_trait]
impl JobHandler for RetentionHandler {
    fn job_type(&self) -> JobType {
        JobType::Retention
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: RetentionPayload = ctx
            .payload()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let retain_days = payload
            .retain_days
            .unwrap_or(self.retain_days)
            .max(0);
        let cutoff = Utc::now() - Duration::days(retain_days);

        info!(
            subsystem = "jobs",
            component = "retention",
            op = "sweep",
            retain_days,
            cutoff = %cutoff,
            "Pruning records older than cutoff"
        );

        // Blob paths first: once the rows cascade away there is nothing
        // left pointing at the payloads.
        let payload_paths = match self.images.payload_paths_older_than(cutoff).await {
            Ok(paths) => paths,
            Err(e) => return JobResult::Failed(format!("Collecting payload paths: {}", e)),
        };

        let notes_deleted = match self.notes.delete_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => return JobResult::Failed(format!("Deleting notes: {}", e)),
        };
        let images_deleted = match self.images.delete_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => return JobResult::Failed(format!("Deleting images: {}", e)),
        };
        let tracks_deleted = match self.tracks.delete_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => return JobResult::Failed(format!("Deleting tracks: {}", e)),
        };

        let mut payloads_deleted: u64 = 0;
        for path in &payload_paths {
            match self.storage.delete(path).await {
                Ok(()) => payloads_deleted += 1,
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "retention",
                    storage_path = %path,
                    error = %e,
                    "Failed to delete payload blob"
                ),
            }
        }

        info!(
            subsystem = "jobs",
            component = "retention",
            op = "done",
            deleted_count = notes_deleted + images_deleted + tracks_deleted,
            payloads_deleted,
            "Retention sweep finished"
        );

        JobResult::Success(Some(json!({
            "tracks_deleted": tracks_deleted,
            "notes_deleted": notes_deleted,
            "images_deleted": images_deleted,
            "payloads_deleted": payloads_deleted,
        })))
    }
}
