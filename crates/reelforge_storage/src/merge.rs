//! Lossless concatenation of ordered media segments with ffmpeg.

use reelforge_core::MediaAttachment;
use reelforge_error::{
    MergeError, MergeErrorKind, ReelforgeResult, StorageError, StorageErrorKind,
    SubprocessErrorKind,
};
use reelforge_process::{CommandRunner, SubprocessInvocation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const OUTPUT_NAME: &str = "merged.mp4";
const OUTPUT_MIME: &str = "video/mp4";

/// Concatenates segments in "copy" mode, one scratch directory per call.
#[derive(Clone)]
pub struct MergePipeline {
    ffmpeg: String,
    scratch_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl std::fmt::Debug for MergePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergePipeline")
            .field("ffmpeg", &self.ffmpeg)
            .field("scratch_root", &self.scratch_root)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MergePipeline {
    /// Create a pipeline.
    ///
    /// * `ffmpeg` - executable name or path
    /// * `scratch_root` - parent of the per-call scratch directories
    pub fn new(
        ffmpeg: impl Into<String>,
        scratch_root: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            scratch_root: scratch_root.into(),
            runner,
            timeout,
        }
    }

    /// Merge `segments` in order and return the merged file.
    ///
    /// The scratch directory holding the inputs, manifest and output is removed
    /// before this returns, whether ffmpeg succeeded or not.
    #[instrument(skip(self, segments), fields(segments = segments.len()))]
    pub async fn merge(&self, segments: &[MediaAttachment]) -> ReelforgeResult<MediaAttachment> {
        if segments.is_empty() {
            return Err(MergeError::new(MergeErrorKind::NoSegments).into());
        }

        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    self.scratch_root.display(),
                    e
                )))
            })?;
        let scratch = tempfile::Builder::new()
            .prefix("merge-")
            .tempdir_in(&self.scratch_root)
            .map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    self.scratch_root.display(),
                    e
                )))
            })?;

        let result = self.merge_in(scratch.path(), segments).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "Failed to remove merge scratch directory");
        }
        result
    }

    async fn merge_in(
        &self,
        dir: &Path,
        segments: &[MediaAttachment],
    ) -> ReelforgeResult<MediaAttachment> {
        let dir = std::path::absolute(dir).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;

        let mut inputs = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            let path = dir.join(format!("part-{:04}{}", index + 1, segment.extension()));
            tokio::fs::write(&path, segment.bytes()).await.map_err(|e| {
                StorageError::new(StorageErrorKind::Write(format!("{}: {}", path.display(), e)))
            })?;
            inputs.push(path);
        }

        let manifest = dir.join("list.txt");
        tokio::fs::write(&manifest, concat_manifest(&inputs))
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::Write(format!(
                    "{}: {}",
                    manifest.display(),
                    e
                )))
            })?;

        let output = dir.join(OUTPUT_NAME);
        let invocation = SubprocessInvocation::builder()
            .command(self.ffmpeg.clone())
            .args(vec![
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-f".to_string(),
                "concat".to_string(),
                "-safe".to_string(),
                "0".to_string(),
                "-i".to_string(),
                manifest.display().to_string(),
                "-c".to_string(),
                "copy".to_string(),
                "-y".to_string(),
                output.display().to_string(),
            ])
            .timeout(self.timeout)
            .build()?;

        debug!(ffmpeg = %self.ffmpeg, "Running concat");
        self.runner.run(&invocation).await.map_err(|e| match e.kind {
            SubprocessErrorKind::NotFound(_) => {
                MergeError::new(MergeErrorKind::ToolMissing(self.ffmpeg.clone()))
            }
            _ => MergeError::new(MergeErrorKind::ToolFailed(e.to_string())),
        })?;

        let bytes = tokio::fs::read(&output).await.map_err(|e| {
            MergeError::new(MergeErrorKind::ToolFailed(format!(
                "no output at {}: {}",
                output.display(),
                e
            )))
        })?;

        info!(bytes = bytes.len(), "Merged segments");
        Ok(MediaAttachment::new(OUTPUT_NAME, OUTPUT_MIME, bytes))
    }
}

/// Build an ffmpeg concat-demuxer manifest. Single quotes in paths are
/// closed, escaped and reopened (`'\''`).
///
/// # Examples
///
/// ```
/// use reelforge_storage::concat_manifest;
/// use std::path::PathBuf;
///
/// let manifest = concat_manifest(&[PathBuf::from("/tmp/it's/part-0001.mp4")]);
/// assert_eq!(manifest, "file '/tmp/it'\\''s/part-0001.mp4'\n");
/// ```
pub fn concat_manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| {
            format!(
                "file '{}'\n",
                path.display().to_string().replace('\'', "'\\''")
            )
        })
        .collect()
}
