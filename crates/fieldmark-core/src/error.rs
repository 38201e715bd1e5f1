//! Error types for fieldmark.

use thiserror::Error;

/// Result type alias using fieldmark's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fieldmark operations.
///
/// The import pipeline sorts these into four classes:
/// - fatal: [`Error::SourceUnavailable`], [`Error::CorruptSource`]; the run
///   aborts and the failure is surfaced to the job queue,
/// - recoverable-duplicate: [`Error::Duplicate`], expected under retries
///   and concurrent runs, never logged as an error,
/// - recoverable-data: [`Error::ImageDecode`] and malformed source rows;
///   the unit is skipped with a warning,
/// - everything else is an unexpected persistence or programming error,
///   skipped with an error log for operator visibility.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uniqueness constraint violated, the record is already imported
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The uploaded source file could not be retrieved
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The uploaded file is not a readable project database
    #[error("Corrupt source: {0}")]
    CorruptSource(String),

    /// An image payload could not be decoded
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a uniqueness-constraint violation.
    ///
    /// Duplicates are the idempotence mechanism of the import pipeline:
    /// a second import of the same record must be skipped, not failed.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }

    /// Whether this error aborts an entire import run.
    ///
    /// Only source-level failures are fatal; per-record errors are absorbed
    /// into the run summary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::SourceUnavailable(_) | Error::CorruptSource(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_duplicate() {
        let err = Error::Duplicate("track (7, 2018-04-02T10:00:00Z)".to_string());
        assert_eq!(
            err.to_string(),
            "Duplicate record: track (7, 2018-04-02T10:00:00Z)"
        );
    }

    #[test]
    fn test_error_display_source_unavailable() {
        let err = Error::SourceUnavailable("object missing".to_string());
        assert_eq!(err.to_string(), "Source unavailable: object missing");
    }

    #[test]
    fn test_error_display_corrupt_source() {
        let err = Error::CorruptSource("missing table gpslogs".to_string());
        assert_eq!(err.to_string(), "Corrupt source: missing table gpslogs");
    }

    #[test]
    fn test_error_display_image_decode() {
        let err = Error::ImageDecode("unexpected EOF".to_string());
        assert_eq!(err.to_string(), "Image decode error: unexpected EOF");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_is_duplicate() {
        assert!(Error::Duplicate("x".into()).is_duplicate());
        assert!(!Error::Internal("x".into()).is_duplicate());
        assert!(!Error::ImageDecode("x".into()).is_duplicate());
    }

    #[test]
    fn test_is_fatal_classes() {
        assert!(Error::SourceUnavailable("x".into()).is_fatal());
        assert!(Error::CorruptSource("x".into()).is_fatal());
        assert!(!Error::Duplicate("x".into()).is_fatal());
        assert!(!Error::ImageDecode("x".into()).is_fatal());
        assert!(!Error::Internal("x".into()).is_fatal());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_result_type_ok() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
