//! tar.gz release unpacking.

use flate2::read::GzDecoder;
use reelforge_error::{BootstrapError, BootstrapErrorKind};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use tar::Archive;

/// Cap on a single decompressed entry.
const MAX_ENTRY_BYTES: u64 = 1024 * 1024 * 1024;

/// Extract the one regular file in `archive` whose name starts with `stem`
/// into `dest_dir`, returning its path.
///
/// Entry paths are reduced to their file name, so nothing is written outside
/// `dest_dir`. Blocking; run it on a blocking thread.
pub fn extract_executable(
    archive: &Path,
    dest_dir: &Path,
    stem: &str,
) -> Result<PathBuf, BootstrapError> {
    let fail = |reason: String| BootstrapError::new(BootstrapErrorKind::Extraction(reason));

    let file = std::fs::File::open(archive)
        .map_err(|e| fail(format!("{}: {}", archive.display(), e)))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(false);
    #[cfg(unix)]
    tar.set_unpack_xattrs(false);

    let entries = tar
        .entries()
        .map_err(|e| fail(format!("bad tar.gz archive: {}", e)))?;

    let mut found: Option<PathBuf> = None;
    for entry in entries {
        let mut entry = entry.map_err(|e| fail(format!("bad tar.gz entry: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| fail(format!("invalid path in tar.gz: {}", e)))?
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_default();
        if !name.starts_with(stem) {
            continue;
        }
        if found.is_some() {
            return Err(fail(format!("archive holds more than one '{}' executable", stem)));
        }
        if entry.size() > MAX_ENTRY_BYTES {
            return Err(fail(format!(
                "entry too large ({} bytes, max {} bytes)",
                entry.size(),
                MAX_ENTRY_BYTES
            )));
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .by_ref()
            .take(MAX_ENTRY_BYTES)
            .read_to_end(&mut data)
            .map_err(|e| fail(e.to_string()))?;
        let target = dest_dir.join(&name);
        std::fs::write(&target, &data).map_err(|e| fail(format!("{}: {}", target.display(), e)))?;
        found = Some(target);
    }

    found.ok_or_else(|| fail(format!("archive does not contain a '{}' executable", stem)))
}
