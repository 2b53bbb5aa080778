//! Request-scoped upload files.

use reelforge_core::MediaAttachment;
use reelforge_error::{ReelforgeResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes attachments into the uploads directory under unique names.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct TransientFileStore {
    dir: PathBuf,
}

impl TransientFileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write one attachment and return a guard that deletes it on drop.
    #[tracing::instrument(skip(self, attachment), fields(name = %attachment.name(), bytes = attachment.len()))]
    pub async fn persist(
        &self,
        attachment: &MediaAttachment,
        prefix: &str,
    ) -> ReelforgeResult<TransientFile> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                self.dir.display(),
                e
            )))
        })?;
        let dir = std::path::absolute(&self.dir).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                self.dir.display(),
                e
            )))
        })?;

        let path = dir.join(format!("{}-{}{}", prefix, Uuid::new_v4(), attachment.extension()));
        // Guard first so a partial write is still removed.
        let file = TransientFile { path };
        tokio::fs::write(&file.path, attachment.bytes())
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::Write(format!(
                    "{}: {}",
                    file.path.display(),
                    e
                )))
            })?;

        tracing::debug!(path = %file.path.display(), "Persisted transient file");
        Ok(file)
    }

    /// Write every attachment. On failure the files already written are removed.
    pub async fn persist_all(
        &self,
        attachments: &[MediaAttachment],
        prefix: &str,
    ) -> ReelforgeResult<Vec<TransientFile>> {
        let mut files = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            files.push(self.persist(attachment, prefix).await?);
        }
        Ok(files)
    }
}

/// An on-disk copy of an attachment, deleted when dropped.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    /// Absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed transient file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove transient file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_are_unique_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let store = TransientFileStore::new(root.path().join("uploads"));
        let attachment = MediaAttachment::new("cat.png", "image/png", vec![1, 2, 3]);

        let first = store.persist(&attachment, "chat").await.unwrap();
        let second = store.persist(&attachment, "chat").await.unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_absolute());
        assert_eq!(first.path().extension().unwrap(), "png");
        assert_eq!(std::fs::read(first.path()).unwrap(), vec![1, 2, 3]);

        let paths = [first.path().to_path_buf(), second.path().to_path_buf()];
        drop(first);
        drop(second);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_batch_is_cleaned_up_when_dropped() {
        let root = tempfile::tempdir().unwrap();
        let uploads = root.path().join("uploads");
        let store = TransientFileStore::new(&uploads);
        let attachments = vec![
            MediaAttachment::new("a.jpg", "image/jpeg", vec![0; 16]),
            MediaAttachment::new("b", "image/webp", vec![0; 16]),
        ];
        let files = store.persist_all(&attachments, "prompt").await.unwrap();
        assert_eq!(std::fs::read_dir(&uploads).unwrap().count(), 2);
        drop(files);
        assert_eq!(std::fs::read_dir(&uploads).unwrap().count(), 0);
    }
}
