//! Core data models for fieldmark.
//!
//! Records produced by the import pipeline: GPS tracks, field notes, and
//! the images attached to notes. Read models carry the persisted row;
//! `New*` structs carry the insert request. Rows are created by the import
//! pipeline (or manual entry outside this core) and are immutable afterward
//! except for the `modified_at` stamp; deletion is the retention job's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::geometry::{LineGeometry, Point};

// =============================================================================
// TRACKS
// =============================================================================

/// A captured GPS track with its line geometry.
///
/// `(owner_id, started_at)` is unique: re-importing the same track is
/// rejected by the store, not duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    /// Importing user (opaque numeric id from the accounts system).
    pub owner_id: i64,
    /// Free-text note attached to the track.
    pub text: Option<String>,
    /// Timestamp of the first fix.
    pub started_at: DateTime<Utc>,
    /// Timestamp of the last fix.
    pub ended_at: DateTime<Utc>,
    /// Track length in metres, as computed by the capturing device.
    pub length_m: Option<f64>,
    /// Ordered vertices in capture order.
    pub line: LineGeometry,
    pub modified_at: DateTime<Utc>,
}

/// Request for inserting a new track.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub owner_id: i64,
    pub text: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub length_m: Option<f64>,
    pub line: LineGeometry,
}

// =============================================================================
// NOTES
// =============================================================================

/// A single field observation: location, timestamp, free text, and an
/// opaque structured form payload.
///
/// `(owner_id, taken_at)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: i64,
    /// Category/description label ("note type").
    pub description: Option<String>,
    /// Free-text body.
    pub text: Option<String>,
    /// Form payload as captured by the mobile app. Stored opaque; the
    /// pipeline never interprets it.
    pub form: Option<JsonValue>,
    pub taken_at: DateTime<Utc>,
    pub location: Point,
    /// Altitude in metres, when the device recorded one.
    pub altitude: Option<f64>,
    pub modified_at: DateTime<Utc>,
}

/// Request for inserting a new note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub owner_id: i64,
    pub description: Option<String>,
    pub text: Option<String>,
    pub form: Option<JsonValue>,
    pub taken_at: DateTime<Utc>,
    pub location: Point,
    pub altitude: Option<f64>,
}

// =============================================================================
// IMAGES
// =============================================================================

/// The three binary payloads stored for an image.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Orientation-corrected full-resolution image.
    pub image: Vec<u8>,
    /// Pre-sized index thumbnail, passed through from the source.
    pub thumbnail: Vec<u8>,
    /// Downscaled web preview.
    pub web_image: Vec<u8>,
}

/// A photo or sketch attached to a note.
///
/// Carries its own location and time, distinct from the parent note's.
/// `(owner_id, taken_at)` is unique. The image's lifecycle is bound to its
/// note: deleting the note deletes its images, and deleting an image
/// deletes its stored payload blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub owner_id: i64,
    /// Owning note. Mandatory: an image with no parent note is never
    /// imported.
    pub note_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub location: Point,
    pub altitude: Option<f64>,
    /// Camera heading in degrees, when recorded.
    pub azimuth: Option<f64>,
    /// Storage path of the full image payload.
    pub image_path: String,
    /// Storage path of the thumbnail payload.
    pub thumbnail_path: String,
    /// Storage path of the web preview payload.
    pub web_image_path: String,
    pub modified_at: DateTime<Utc>,
}

/// Request for inserting a new image together with its payloads.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub owner_id: i64,
    pub note_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub location: Point,
    pub altitude: Option<f64>,
    pub azimuth: Option<f64>,
    pub payload: ImagePayload,
}

// =============================================================================
// RUN SUMMARY
// =============================================================================

/// Aggregate counts returned by one import invocation.
///
/// Serializable so it can ride in the job result column. `skipped` counts
/// cover the expected outcomes (duplicates, undecodable images); records
/// failing with unexpected persistence errors are error-logged and appear
/// in neither column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tracks_imported: u64,
    pub tracks_skipped: u64,
    pub notes_imported: u64,
    pub notes_skipped: u64,
    pub images_imported: u64,
    pub images_skipped: u64,
}

// =============================================================================
// JOBS
// =============================================================================

/// Kind of background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Import one uploaded project file.
    ProjectImport,
    /// Prune records older than the retention window.
    Retention,
}

impl JobType {
    /// Database string for this job type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ProjectImport => "project_import",
            JobType::Retention => "retention",
        }
    }

    /// Parse the database string back into a job type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project_import" => Some(JobType::ProjectImport),
            "retention" => Some(JobType::Retention),
            _ => None,
        }
    }

    /// Default queue priority for this job type (higher runs first).
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::ProjectImport => 5,
            JobType::Retention => 1,
        }
    }
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Database string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the database string back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// A queued background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
