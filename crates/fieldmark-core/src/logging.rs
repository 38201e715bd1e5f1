//! Structured logging schema and field name constants for fieldmark.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Unexpected persistence failure, requires operator attention |
//! | WARN  | Recoverable data problem, unit skipped |
//! | INFO  | Lifecycle events (worker start/stop), run summaries |
//! | DEBUG | Duplicate skips, config choices, decision points |
//! | TRACE | Per-row iteration detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "import", "db", "jobs", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "coordinator", "source", "normalize", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "fetch_source", "parse_tracks", "parse_notes", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner (uploading user) numeric id.
pub const OWNER_ID: &str = "owner_id";

/// Storage reference of the uploaded project file.
pub const SOURCE_REF: &str = "source_ref";

/// Track-log row id within the source file.
pub const TRACK_LOG_ID: &str = "track_log_id";

/// Note row id within the source file.
pub const NOTE_ID: &str = "note_id";

/// Image row id within the source file.
pub const IMAGE_ID: &str = "image_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of coordinate rows read for a track.
pub const POINT_COUNT: &str = "point_count";

/// Number of rows deleted by the retention job.
pub const DELETED_COUNT: &str = "deleted_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
