//! Streaming download with SHA-256 verification.

use futures::StreamExt;
use reelforge_error::{BootstrapError, BootstrapErrorKind};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Largest release asset accepted.
const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// Download `url` into a temp file inside `staging_dir`, hashing as it streams.
///
/// When `expected_sha256` is set and differs from the computed digest the temp
/// file is deleted and a hash mismatch is returned; nothing is left behind for
/// a later call to mistake for a valid binary.
///
/// The download fails if the server goes `stall_timeout` without sending
/// headers or body data.
///
/// `on_verify` is called once the body is fully received, before comparing.
#[instrument(skip(client, on_verify), fields(url = %url))]
pub async fn download_verified(
    client: &reqwest::Client,
    url: &str,
    staging_dir: &Path,
    expected_sha256: Option<&str>,
    stall_timeout: Duration,
    on_verify: impl FnOnce(),
) -> Result<NamedTempFile, BootstrapError> {
    let download = |reason: String| BootstrapError::new(BootstrapErrorKind::Download(reason));
    let stalled = || download(format!("{}: no data for {:?}", url, stall_timeout));

    let response = tokio::time::timeout(stall_timeout, client.get(url).send())
        .await
        .map_err(|_| stalled())?
        .map_err(|e| download(format!("{}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(download(format!("HTTP {} from {}", response.status(), url)));
    }
    if let Some(len) = response.content_length() {
        if len > MAX_DOWNLOAD_BYTES {
            return Err(download(format!(
                "asset too large ({} bytes, max {} bytes)",
                len, MAX_DOWNLOAD_BYTES
            )));
        }
    }

    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| download(format!("{}: {}", staging_dir.display(), e)))?;
    let staged = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(staging_dir)
        .map_err(|e| download(format!("{}: {}", staging_dir.display(), e)))?;
    let std_file = staged
        .reopen()
        .map_err(|e| download(format!("{}: {}", staged.path().display(), e)))?;
    let mut file = tokio::fs::File::from_std(std_file);

    let mut hasher = Sha256::new();
    let mut received: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = tokio::time::timeout(stall_timeout, body.next())
        .await
        .map_err(|_| stalled())?
    {
        let chunk = chunk.map_err(|e| download(format!("{}: {}", url, e)))?;
        received += chunk.len() as u64;
        if received > MAX_DOWNLOAD_BYTES {
            return Err(download(format!(
                "asset exceeded {} bytes",
                MAX_DOWNLOAD_BYTES
            )));
        }
        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| download(format!("{}: {}", staged.path().display(), e)))?;
    }
    file.flush()
        .await
        .map_err(|e| download(format!("{}: {}", staged.path().display(), e)))?;
    drop(file);
    debug!(bytes = received, "Download complete");

    on_verify();
    let actual = format!("{:x}", hasher.finalize());
    match expected_sha256 {
        Some(expected) if !expected.eq_ignore_ascii_case(&actual) => {
            warn!(%expected, %actual, "Hash mismatch; discarding download");
            // Dropping `staged` deletes it.
            Err(BootstrapError::new(BootstrapErrorKind::HashMismatch {
                asset: url.to_string(),
                expected: expected.to_string(),
                actual,
            }))
        }
        Some(_) => {
            info!(sha256 = %actual, "Hash verified");
            Ok(staged)
        }
        None => {
            warn!(sha256 = %actual, "No expected hash configured; download is unverified");
            Ok(staged)
        }
    }
}
