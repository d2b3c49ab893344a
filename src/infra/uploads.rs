//! Image upload storage
//!
//! Complaint photos and resolution proofs are written under one directory
//! with random names; only the stored file name is kept on the complaint.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{DeskError, Result};

/// Extensions accepted for complaint images and proofs.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Default upload size limit (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Lowercased extension of `filename` if it is an accepted image type.
pub fn image_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate an upload without writing it.
    pub fn check(&self, filename: &str, len: usize) -> Result<String> {
        if filename.trim().is_empty() {
            return Err(DeskError::validation("no file selected"));
        }
        let ext = image_extension(filename)
            .ok_or_else(|| DeskError::validation("only jpg, jpeg, png allowed"))?;
        if len == 0 {
            return Err(DeskError::validation("uploaded file is empty"));
        }
        if len > self.max_bytes {
            return Err(DeskError::validation(format!(
                "file exceeds {} byte limit",
                self.max_bytes
            )));
        }
        Ok(ext)
    }

    /// Store `bytes` under a fresh random name and return that name.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let ext = self.check(filename, bytes.len())?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let stored = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&stored), bytes).await?;
        Ok(stored)
    }

    /// Best-effort removal of a file written by an aborted request.
    pub async fn discard(&self, stored: &str) {
        if let Err(e) = tokio::fs::remove_file(self.dir.join(stored)).await {
            tracing::debug!(file = %stored, error = %e, "Failed to remove upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_rules() {
        assert_eq!(image_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert!(image_extension("doc.pdf").is_none());
        assert!(image_extension("noext").is_none());
    }

    #[test]
    fn size_limit_is_inclusive() {
        let store = UploadStore::new("/tmp/unused", 10);
        assert!(store.check("a.png", 10).is_ok());
        assert!(store.check("a.png", 11).is_err());
        assert!(store.check("a.png", 0).is_err());
        assert!(store.check("", 1).is_err());
    }

    #[tokio::test]
    async fn save_writes_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024);
        let name = store.save("pothole.jpg", b"img").await.unwrap();
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, "pothole.jpg");
        assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), b"img");

        store.discard(&name).await;
        assert!(!dir.path().join(&name).exists());
    }
}
