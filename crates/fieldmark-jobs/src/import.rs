//! The project import coordinator.
//!
//! Drives one uploaded project file through
//! `FETCH_SOURCE → PARSE_TRACKS → PARSE_NOTES(+IMAGES) → CLEANUP → DONE`.
//!
//! Each record commits in its own transaction, so one bad row (or a
//! record a previous run already imported) never rolls back or blocks the
//! rest of the file. Uniqueness constraints at the store are the sole
//! guard against double-import when concurrent runs race; a duplicate-key
//! outcome is therefore expected and recoverable, never fatal. Only a
//! failure to fetch or open the source file aborts the run.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use fieldmark_core::{
    Error, ImageRepository, LineGeometry, NewImage, NewNote, NewTrack, NoteRepository, Point,
    Result, RunSummary, TrackRepository,
};
use fieldmark_db::StorageBackend;

use crate::normalize::normalize;
use crate::source::ProjectSource;

/// Coordinates one import run over the repository and storage seams.
pub struct ProjectImporter {
    storage: Arc<dyn StorageBackend>,
    tracks: Arc<dyn TrackRepository>,
    notes: Arc<dyn NoteRepository>,
    images: Arc<dyn ImageRepository>,
}

impl ProjectImporter {
    /// Create a new importer over the given collaborators.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        tracks: Arc<dyn TrackRepository>,
        notes: Arc<dyn NoteRepository>,
        images: Arc<dyn ImageRepository>,
    ) -> Self {
        Self {
            storage,
            tracks,
            notes,
            images,
        }
    }

    /// Import one uploaded project file for the given owner.
    ///
    /// Runs sequentially within the invocation; the uploading user is not
    /// waiting on it. Returns the run summary, or a fatal error when the
    /// source cannot be fetched or read as a project database. Every
    /// other failure is absorbed into the summary and the logs.
    pub async fn import_project(&self, source_ref: &str, owner_id: i64) -> Result<RunSummary> {
        let start = Instant::now();
        info!(
            subsystem = "import",
            component = "coordinator",
            op = "start",
            source_ref,
            owner_id,
            "Importing project file"
        );

        // FETCH_SOURCE: the upload may live on remote object storage, so
        // pull a scratch copy before handing it to SQLite. The scratch file
        // is uniquely named per invocation and removed on drop on every
        // exit path, fatal errors included.
        let data = self
            .storage
            .read(source_ref)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", source_ref, e)))?;
        let mut scratch = NamedTempFile::new()
            .map_err(|e| Error::SourceUnavailable(format!("scratch file: {}", e)))?;
        scratch
            .write_all(&data)
            .and_then(|_| scratch.flush())
            .map_err(|e| Error::SourceUnavailable(format!("scratch file: {}", e)))?;

        let source = ProjectSource::open(scratch.path())?;

        let mut summary = RunSummary::default();
        self.import_tracks(&source, owner_id, &mut summary).await?;
        self.import_notes(&source, owner_id, &mut summary).await?;

        info!(
            subsystem = "import",
            component = "coordinator",
            op = "done",
            owner_id,
            tracks_imported = summary.tracks_imported,
            tracks_skipped = summary.tracks_skipped,
            notes_imported = summary.notes_imported,
            notes_skipped = summary.notes_skipped,
            images_imported = summary.images_imported,
            images_skipped = summary.images_skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Project import finished"
        );
        Ok(summary)
    }

    /// PARSE_TRACKS: one isolated commit per track-log.
    async fn import_tracks(
        &self,
        source: &ProjectSource,
        owner_id: i64,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for log in source.track_logs()? {
            let points = match source.coordinates_for(log.id) {
                Ok(points) => points,
                Err(e) => {
                    warn!(
                        track_log_id = log.id,
                        error = %e,
                        "Skipping track with malformed coordinate rows"
                    );
                    continue;
                }
            };
            if points.is_empty() {
                warn!(track_log_id = log.id, "Skipping track with no coordinate rows");
                continue;
            }

            let (Some(started_at), Some(ended_at)) =
                (timestamp(log.started_at_ms), timestamp(log.ended_at_ms))
            else {
                warn!(track_log_id = log.id, "Skipping track with malformed timestamps");
                continue;
            };

            let vertices = points.iter().map(|p| Point::new(p.lon, p.lat)).collect();
            let line = match LineGeometry::from_points(vertices) {
                Ok(line) => line,
                Err(e) => {
                    warn!(track_log_id = log.id, error = %e, "Skipping track without geometry");
                    continue;
                }
            };

            let track = NewTrack {
                owner_id,
                text: log.text,
                started_at,
                ended_at,
                length_m: log.length_m,
                line,
            };
            match self.tracks.insert(track).await {
                Ok(_) => summary.tracks_imported += 1,
                Err(e) if e.is_duplicate() => {
                    debug!(track_log_id = log.id, "Track already imported");
                    summary.tracks_skipped += 1;
                }
                Err(e) => {
                    error!(track_log_id = log.id, error = %e, "Failed to persist track");
                }
            }
        }
        Ok(())
    }

    /// PARSE_NOTES: the note commits first so its images can reference the
    /// assigned identity; a duplicate note short-circuits all of its
    /// images' decode work.
    async fn import_notes(
        &self,
        source: &ProjectSource,
        owner_id: i64,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for record in source.notes()? {
            let Some(taken_at) = timestamp(record.timestamp_ms) else {
                warn!(note_id = record.id, "Skipping note with malformed timestamp");
                continue;
            };

            let note = NewNote {
                owner_id,
                description: record.description,
                text: record.text,
                form: record.form.map(parse_form),
                taken_at,
                location: Point::new(record.lon, record.lat),
                altitude: record.altitude,
            };
            let note_pk = match self.notes.insert(note).await {
                Ok(id) => {
                    summary.notes_imported += 1;
                    id
                }
                Err(e) if e.is_duplicate() => {
                    // An existing note is presumed fully imported; its
                    // images are counted skipped without ever being read.
                    debug!(note_id = record.id, "Note already imported, skipping its images");
                    summary.notes_skipped += 1;
                    summary.images_skipped += source.image_count_for(record.id).unwrap_or(0);
                    continue;
                }
                Err(e) => {
                    error!(note_id = record.id, error = %e, "Failed to persist note");
                    continue;
                }
            };

            let images = match source.images_for(record.id) {
                Ok(images) => images,
                Err(e) => {
                    warn!(note_id = record.id, error = %e, "Skipping unreadable images for note");
                    continue;
                }
            };
            for img in images {
                let payload = match normalize(&img.image, &img.thumbnail) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(image_id = img.id, error = %e, "Skipping undecodable image");
                        summary.images_skipped += 1;
                        continue;
                    }
                };
                let Some(img_taken_at) = timestamp(img.timestamp_ms) else {
                    warn!(image_id = img.id, "Skipping image with malformed timestamp");
                    summary.images_skipped += 1;
                    continue;
                };

                let image = NewImage {
                    owner_id,
                    note_id: note_pk,
                    taken_at: img_taken_at,
                    location: Point::new(img.lon, img.lat),
                    altitude: img.altitude,
                    azimuth: img.azimuth,
                    payload: fieldmark_core::ImagePayload {
                        image: payload.image,
                        thumbnail: payload.thumbnail,
                        web_image: payload.web_image,
                    },
                };
                match self.images.insert(image).await {
                    Ok(_) => summary.images_imported += 1,
                    Err(e) if e.is_duplicate() => {
                        debug!(image_id = img.id, "Image already imported");
                        summary.images_skipped += 1;
                    }
                    Err(e) => {
                        error!(image_id = img.id, error = %e, "Failed to persist image");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Convert a source timestamp (milliseconds since epoch) to UTC.
fn timestamp(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Parse the opaque form payload. Text that is not valid JSON is wrapped
/// as a JSON string rather than dropped; the pipeline does not interpret
/// form content either way.
fn parse_form(raw: String) -> JsonValue {
    serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
}
