//! Release asset lookup per OS and architecture.

use crate::BinaryAsset;
use reelforge_error::{BootstrapError, BootstrapErrorKind};
use std::path::Path;

/// Where release assets are downloaded from unless overridden.
pub const DEFAULT_RELEASE_BASE: &str =
    "https://github.com/xtekky/gpt4free/releases/latest/download/";

/// Release filename, archive flag and pinned hash per supported platform.
///
/// Hashes are `None` because `latest` moves; set `G4F_SHA256` to pin one.
const RELEASE_TABLE: &[(&str, &str, &str, bool, Option<&str>)] = &[
    ("linux", "x86_64", "g4f-linux-amd64", false, None),
    ("linux", "aarch64", "g4f-linux-arm64", false, None),
    ("macos", "x86_64", "g4f-macos-amd64.tar.gz", true, None),
    ("macos", "aarch64", "g4f-macos-arm64.tar.gz", true, None),
    ("windows", "x86_64", "g4f-windows-amd64.exe", false, None),
];

/// An operating system and CPU architecture pair.
///
/// # Examples
///
/// ```
/// use reelforge_bootstrap::Platform;
///
/// let platform = Platform::new("linux", "aarch64");
/// assert_eq!(platform.key(), "linux-aarch64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Describe a platform explicitly.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Directory name under `bin/`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Resolve the release asset for this platform.
    ///
    /// Fails fast on platforms without a published build.
    #[track_caller]
    pub fn release_asset(
        &self,
        release_base: &str,
        bin_root: &Path,
        sha256_override: Option<&str>,
    ) -> Result<BinaryAsset, BootstrapError> {
        let (_, _, filename, archive, pinned) = RELEASE_TABLE
            .iter()
            .find(|(os, arch, ..)| *os == self.os && *arch == self.arch)
            .ok_or_else(|| {
                BootstrapError::new(BootstrapErrorKind::UnsupportedPlatform {
                    os: self.os.clone(),
                    arch: self.arch.clone(),
                })
            })?;

        let base = if release_base.ends_with('/') {
            release_base.to_string()
        } else {
            format!("{}/", release_base)
        };
        let executable = if self.os == "windows" { "g4f.exe" } else { "g4f" };

        Ok(BinaryAsset {
            platform_key: self.key(),
            filename: filename.to_string(),
            url: format!("{}{}", base, filename),
            sha256: sha256_override
                .map(|s| s.trim().to_ascii_lowercase())
                .or_else(|| pinned.map(str::to_string)),
            archive: *archive,
            install_path: bin_root.join(self.key()).join(executable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_asset() {
        let asset = Platform::new("linux", "x86_64")
            .release_asset("http://mirror.local/g4f", Path::new("/data/bin"), Some(" ABCD "))
            .unwrap();
        assert_eq!(asset.url, "http://mirror.local/g4f/g4f-linux-amd64");
        assert_eq!(asset.sha256.as_deref(), Some("abcd"));
        assert!(!asset.archive);
        assert_eq!(asset.install_path, Path::new("/data/bin/linux-x86_64/g4f"));
    }

    #[test]
    fn test_macos_is_archived() {
        let asset = Platform::new("macos", "aarch64")
            .release_asset(DEFAULT_RELEASE_BASE, Path::new("bin"), None)
            .unwrap();
        assert!(asset.archive);
        assert!(asset.url.ends_with("g4f-macos-arm64.tar.gz"));
        assert!(asset.sha256.is_none());
    }

    #[test]
    fn test_unsupported_platform_fails_fast() {
        let err = Platform::new("freebsd", "riscv64")
            .release_asset(DEFAULT_RELEASE_BASE, Path::new("bin"), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported platform: freebsd-riscv64");
    }
}
