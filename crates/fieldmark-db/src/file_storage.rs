//! Pluggable blob storage for uploaded project files and image payloads.
//!
//! The import pipeline reads the uploaded project file and writes image
//! payloads through [`StorageBackend`], so it never assumes local disk vs.
//! remote object storage. The filesystem implementation here stores blobs
//! in a UUID-sharded directory hierarchy with atomic writes.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use fieldmark_core::Result;

/// Storage backend trait for different storage implementations.
///
/// Allows abstracting over filesystem, S3, or other storage providers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Storage paths for the three payloads of one image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPaths {
    pub image: String,
    pub thumbnail: String,
    pub web_image: String,
}

/// Generate the payload paths for an image record.
///
/// Path format: `blobs/{first-2-hex}/{next-2-hex}/{uuid}[_suffix].jpg`.
/// Keying blobs by the row UUID keeps concurrent import runs from ever
/// colliding on a path.
pub fn payload_paths(id: &Uuid) -> PayloadPaths {
    let hex = id.as_hyphenated().to_string().replace('-', "");
    let dir = format!("blobs/{}/{}", &hex[0..2], &hex[2..4]);
    PayloadPaths {
        image: format!("{}/{}.jpg", dir, id.as_hyphenated()),
        thumbnail: format!("{}/{}_thumb.jpg", dir, id.as_hyphenated()),
        web_image: format!("{}/{}_web.jpg", dir, id.as_hyphenated()),
    }
}

/// Filesystem storage backend.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Performs a full round-trip test at startup to catch filesystem
    /// issues (overlayfs quirks, permission errors, missing directories)
    /// early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("blobs/.health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await; // Best-effort cleanup

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, size = data.len(), "storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "storage: create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "storage: rename failed");
            e
        })?;

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        Ok(fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        Ok(fs::try_exists(full_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_paths_sharded_by_uuid() {
        let id = Uuid::parse_str("01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f").unwrap();
        let paths = payload_paths(&id);
        assert_eq!(
            paths.image,
            "blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.jpg"
        );
        assert_eq!(
            paths.thumbnail,
            "blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f_thumb.jpg"
        );
        assert_eq!(
            paths.web_image,
            "blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f_web.jpg"
        );
    }

    #[test]
    fn test_payload_paths_distinct_per_record() {
        let a = payload_paths(&Uuid::now_v7());
        let b = payload_paths(&Uuid::now_v7());
        assert_ne!(a.image, b.image);
        assert_ne!(a.thumbnail, b.thumbnail);
        assert_ne!(a.web_image, b.web_image);
    }

    #[tokio::test]
    async fn test_filesystem_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend.write("blobs/aa/bb/test.jpg", b"payload").await.unwrap();
        assert!(backend.exists("blobs/aa/bb/test.jpg").await.unwrap());
        assert_eq!(backend.read("blobs/aa/bb/test.jpg").await.unwrap(), b"payload");

        backend.delete("blobs/aa/bb/test.jpg").await.unwrap();
        assert!(!backend.exists("blobs/aa/bb/test.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_filesystem_backend_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.delete("blobs/aa/bb/never-written.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_filesystem_backend_read_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        assert!(backend.read("blobs/aa/bb/missing.jpg").await.is_err());
    }

    #[tokio::test]
    async fn test_filesystem_backend_validate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.validate().await.unwrap();
    }
}
