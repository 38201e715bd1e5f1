//! Default values for tunable parameters.
//!
//! Environment variables (read by `WorkerConfig::from_env` and the worker
//! binary) override these at runtime.

/// Maximum edge length of the web preview image in pixels.
///
/// The preview is downscaled so neither dimension exceeds this, preserving
/// aspect ratio. Images already within bounds are left at their size.
pub const WEB_IMAGE_MAX_PX: u32 = 480;

/// JPEG quality for the web preview encoding.
pub const WEB_IMAGE_QUALITY: u8 = 85;

/// JPEG quality for the orientation-corrected full image.
pub const FULL_IMAGE_QUALITY: u8 = 95;

/// Default number of days imported records are retained.
pub const RETAIN_DAYS: i64 = 365;

/// Default polling interval for the job worker (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum number of concurrently executing jobs.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default maximum retries for failed jobs.
pub const JOB_MAX_RETRIES: i32 = 3;
