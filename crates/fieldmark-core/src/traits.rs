//! Core traits for fieldmark abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The import
//! coordinator only ever talks to these, never to a concrete store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// RECORD REPOSITORIES
// =============================================================================

/// Repository for track records.
///
/// `insert` commits exactly one record in its own transaction and returns
/// [`crate::Error::Duplicate`] when `(owner_id, started_at)` already
/// exists; the caller treats that as "already imported", never as failure.
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Insert a new track.
    async fn insert(&self, track: NewTrack) -> Result<Uuid>;

    /// Delete tracks last modified before the cutoff. Returns the number of
    /// rows removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Repository for note records.
///
/// Same single-record transaction and duplicate contract as
/// [`TrackRepository`], keyed on `(owner_id, taken_at)`. Deleting a note
/// cascades to its images at the store level.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note.
    async fn insert(&self, note: NewNote) -> Result<Uuid>;

    /// Delete notes last modified before the cutoff. Returns the number of
    /// rows removed. Dependent images go with them.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Repository for image records and their stored payloads.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a new image, storing its three payload blobs. The row and its
    /// blobs are committed as a unit or not at all.
    async fn insert(&self, image: NewImage) -> Result<Uuid>;

    /// Storage paths of every payload belonging to an image that the next
    /// retention sweep at `cutoff` will remove, whether because the image
    /// itself is old or because its owning note is.
    ///
    /// Callers collect these before deleting rows; the cascade drops the
    /// rows but cannot reach into blob storage.
    async fn payload_paths_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;

    /// Delete images last modified before the cutoff. Returns the number of
    /// rows removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Repository for the background job queue.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Enqueue a new job. Returns the job id.
    async fn enqueue(
        &self,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Claim the next pending job, marking it running. Returns `None` when
    /// the queue is empty. Safe to call from concurrent workers.
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Mark a job completed with an optional result document.
    async fn complete(&self, id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job failed. Jobs with retries left go back to pending.
    async fn fail(&self, id: Uuid, error: &str) -> Result<()>;
}
