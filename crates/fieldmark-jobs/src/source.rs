//! Reader for uploaded project files.
//!
//! A project file is a self-contained SQLite database produced by the
//! mobile data-collection app. It holds GPS track-logs (`gpslogs` with
//! child coordinate rows in `gpslogsdata`), field notes (`notes`), and
//! images (`images` with their binary payloads in `imagedata`).
//!
//! The reader is strictly read-only and never mutates the source. Row
//! order across track-logs and notes follows the underlying table order;
//! coordinate rows within one track are returned ascending by capture
//! time, with ties falling back to source row order (`_id`) so the built
//! geometry stays deterministic even for devices that emitted duplicate
//! timestamps.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use fieldmark_core::{Error, Result};

/// Tables a valid project file must contain.
const REQUIRED_TABLES: [&str; 5] = ["gpslogs", "gpslogsdata", "notes", "images", "imagedata"];

/// A track-log header row.
#[derive(Debug, Clone)]
pub struct TrackLogRecord {
    pub id: i64,
    pub text: Option<String>,
    /// Start of the track, milliseconds since the Unix epoch.
    pub started_at_ms: i64,
    /// End of the track, milliseconds since the Unix epoch.
    pub ended_at_ms: i64,
    /// Track length in metres as computed by the capturing device.
    pub length_m: Option<f64>,
}

/// One coordinate fix belonging to a track-log.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePoint {
    pub lon: f64,
    pub lat: f64,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// A note row.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub altitude: Option<f64>,
    pub timestamp_ms: i64,
    pub description: Option<String>,
    pub text: Option<String>,
    /// Raw form payload as captured; stored opaque downstream.
    pub form: Option<String>,
}

/// An image row joined with its binary payloads.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub altitude: Option<f64>,
    /// Camera heading in degrees, when recorded.
    pub azimuth: Option<f64>,
    pub timestamp_ms: i64,
    /// Full image payload.
    pub image: Vec<u8>,
    /// Pre-sized thumbnail payload.
    pub thumbnail: Vec<u8>,
}

/// Read-only handle on an uploaded project file.
///
/// The connection sits behind a mutex so a source handle can be shared
/// with the async import pipeline; reads within one import run are
/// sequential anyway.
pub struct ProjectSource {
    conn: Mutex<Connection>,
}

impl ProjectSource {
    /// Open a project file.
    ///
    /// # Errors
    /// Returns [`Error::CorruptSource`] if the file is not a readable
    /// SQLite database or any required table is missing.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(source_err)?;

        // A damaged or non-database file only reveals itself on first read.
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(source_err)?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(source_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(source_err)?;
        drop(stmt);

        for required in REQUIRED_TABLES {
            if !tables.iter().any(|t| t == required) {
                return Err(Error::CorruptSource(format!(
                    "missing table {}",
                    required
                )));
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("project source lock poisoned".to_string()))
    }

    /// All track-log header rows, in table order.
    ///
    /// Individual malformed rows are skipped with a warning; they cost one
    /// track, not the run.
    pub fn track_logs(&self) -> Result<Vec<TrackLogRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT _id, text, startts, endts, lengthm FROM gpslogs")
            .map_err(source_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TrackLogRecord {
                    id: row.get("_id")?,
                    text: row.get("text")?,
                    started_at_ms: row.get("startts")?,
                    ended_at_ms: row.get("endts")?,
                    length_m: row.get("lengthm")?,
                })
            })
            .map_err(source_err)?;

        Ok(collect_tolerant(rows, "gpslogs"))
    }

    /// Coordinate rows for one track-log, ascending by capture time.
    ///
    /// Any malformed row fails the whole track: a partial geometry would
    /// silently misrepresent the captured path.
    pub fn coordinates_for(&self, log_id: i64) -> Result<Vec<SourcePoint>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT lon, lat, ts FROM gpslogsdata WHERE logid = ?1 ORDER BY ts ASC, _id ASC")
            .map_err(source_err)?;
        let rows = stmt
            .query_map([log_id], |row| {
                Ok(SourcePoint {
                    lon: row.get("lon")?,
                    lat: row.get("lat")?,
                    timestamp_ms: row.get("ts")?,
                })
            })
            .map_err(source_err)?;

        rows.collect::<rusqlite::Result<_>>().map_err(source_err)
    }

    /// All note rows, in table order. Malformed rows are skipped with a
    /// warning.
    pub fn notes(&self) -> Result<Vec<NoteRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT _id, lon, lat, altim, ts, description, text, form FROM notes")
            .map_err(source_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(NoteRecord {
                    id: row.get("_id")?,
                    lon: row.get("lon")?,
                    lat: row.get("lat")?,
                    altitude: row.get("altim")?,
                    timestamp_ms: row.get("ts")?,
                    description: row.get("description")?,
                    text: row.get("text")?,
                    form: row.get("form")?,
                })
            })
            .map_err(source_err)?;

        Ok(collect_tolerant(rows, "notes"))
    }

    /// Number of image rows attached to one note, without touching the
    /// binary payloads. Lets a duplicate-note skip account for its images
    /// while short-circuiting the decode work.
    pub fn image_count_for(&self, note_id: i64) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM images WHERE note_id = ?1",
                [note_id],
                |row| row.get(0),
            )
            .map_err(source_err)?;
        Ok(count as u64)
    }

    /// Image rows attached to one note, each joined with its payloads.
    ///
    /// Images are only ever read through their owning note, so an image
    /// row referencing a nonexistent note is never touched.
    pub fn images_for(&self, note_id: i64) -> Result<Vec<ImageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT i._id, i.lon, i.lat, i.altim, i.azim, i.ts, d.data, d.thumbnail
                 FROM images i
                 JOIN imagedata d ON d._id = i.imagedata_id
                 WHERE i.note_id = ?1
                 ORDER BY i._id ASC",
            )
            .map_err(source_err)?;
        let rows = stmt
            .query_map([note_id], |row| {
                Ok(ImageRecord {
                    id: row.get("_id")?,
                    lon: row.get("lon")?,
                    lat: row.get("lat")?,
                    altitude: row.get("altim")?,
                    azimuth: row.get("azim")?,
                    timestamp_ms: row.get("ts")?,
                    image: row.get("data")?,
                    thumbnail: row.get("thumbnail")?,
                })
            })
            .map_err(source_err)?;

        Ok(collect_tolerant(rows, "images"))
    }
}

/// Collect mapped rows, dropping malformed ones with a warning.
fn collect_tolerant<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    table: &str,
) -> Vec<T> {
    let mut out = Vec::new();
    for row in rows {
        match row {
            Ok(record) => out.push(record),
            Err(e) => warn!(
                subsystem = "import",
                component = "source",
                db_table = table,
                error = %e,
                "Skipping malformed source row"
            ),
        }
    }
    out
}

fn source_err(e: rusqlite::Error) -> Error {
    Error::CorruptSource(e.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("project.gpap")
    }

    #[test]
    fn test_open_rejects_non_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        fs::write(&path, b"definitely not a sqlite database, not even close").unwrap();

        let result = ProjectSource::open(&path);
        assert!(matches!(result, Err(Error::CorruptSource(_))));
    }

    #[test]
    fn test_open_rejects_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE gpslogs (_id INTEGER PRIMARY KEY)", [])
                .unwrap();
        }

        let result = ProjectSource::open(&path);
        match result {
            Err(Error::CorruptSource(msg)) => assert!(msg.contains("missing table")),
            other => panic!("Expected CorruptSource, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_track_logs_and_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            fixtures::schema(&conn);
            fixtures::add_gpslog(&conn, 1, 1_523_000_000_000, 1_523_000_600_000, 412.0);
            // Inserted out of time order; the reader must sort ascending.
            fixtures::add_point(&conn, 1, 11.2, 46.2, 1_523_000_200_000);
            fixtures::add_point(&conn, 1, 11.1, 46.1, 1_523_000_100_000);
            fixtures::add_point(&conn, 1, 11.3, 46.3, 1_523_000_300_000);
        }

        let source = ProjectSource::open(&path).unwrap();
        let logs = source.track_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, 1);
        assert_eq!(logs[0].length_m, Some(412.0));

        let points = source.coordinates_for(1).unwrap();
        let times: Vec<i64> = points.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(
            times,
            vec![1_523_000_100_000, 1_523_000_200_000, 1_523_000_300_000]
        );
        assert_eq!(points[0].lon, 11.1);
    }

    #[test]
    fn test_coordinates_duplicate_timestamps_fall_back_to_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            fixtures::schema(&conn);
            fixtures::add_gpslog(&conn, 1, 0, 1000, 10.0);
            fixtures::add_point(&conn, 1, 11.1, 46.1, 500);
            fixtures::add_point(&conn, 1, 11.2, 46.2, 500);
        }

        let source = ProjectSource::open(&path).unwrap();
        let points = source.coordinates_for(1).unwrap();
        assert_eq!(points[0].lon, 11.1);
        assert_eq!(points[1].lon, 11.2);
    }

    #[test]
    fn test_coordinates_for_unknown_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            fixtures::schema(&conn);
        }

        let source = ProjectSource::open(&path).unwrap();
        assert!(source.coordinates_for(99).unwrap().is_empty());
    }

    #[test]
    fn test_notes_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            fixtures::schema(&conn);
            fixtures::add_note(
                &conn,
                1,
                11.34,
                46.5,
                1_523_000_000_000,
                "vegetation",
                "old larch stand",
                Some(r#"{"forms":[]}"#),
            );
        }

        let source = ProjectSource::open(&path).unwrap();
        let notes = source.notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].description.as_deref(), Some("vegetation"));
        assert_eq!(notes[0].text.as_deref(), Some("old larch stand"));
        assert_eq!(notes[0].form.as_deref(), Some(r#"{"forms":[]}"#));
        assert_eq!(notes[0].altitude, Some(312.5));
    }

    #[test]
    fn test_images_for_joins_payloads_and_excludes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_path(&dir);
        {
            let conn = Connection::open(&path).unwrap();
            fixtures::schema(&conn);
            fixtures::add_note(&conn, 1, 11.0, 46.0, 1000, "site", "", None);
            fixtures::add_image(&conn, 1, 1, 2000, b"full-bytes", b"thumb-bytes");
            // Orphan: references a note id that does not exist.
            fixtures::add_image(&conn, 2, 42, 3000, b"orphan", b"orphan-thumb");
        }

        let source = ProjectSource::open(&path).unwrap();
        let images = source.images_for(1).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(source.image_count_for(1).unwrap(), 1);
        assert_eq!(images[0].image, b"full-bytes");
        assert_eq!(images[0].thumbnail, b"thumb-bytes");
        assert_eq!(images[0].azimuth, Some(184.0));

        // The orphan only surfaces for its phantom note id, which the
        // coordinator never iterates because no such note row exists.
        assert!(source.images_for(7).unwrap().is_empty());
    }
}
