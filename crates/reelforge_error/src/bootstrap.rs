//! Errors raised while making an external release binary usable.

/// Failure modes of the download-verify-extract-launch sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BootstrapErrorKind {
    /// No release asset exists for this OS/architecture
    #[display("Unsupported platform: {}-{}", os, arch)]
    UnsupportedPlatform {
        /// Operating system (e.g. "linux")
        os: String,
        /// CPU architecture (e.g. "x86_64")
        arch: String,
    },

    /// The release could not be fetched
    #[display("Download failed: {}", _0)]
    Download(String),

    /// The downloaded bytes do not match the pinned digest
    #[display("Hash mismatch for {}: expected {}, got {}", asset, expected, actual)]
    HashMismatch {
        /// Release file name
        asset: String,
        /// Expected SHA-256 (hex)
        expected: String,
        /// Computed SHA-256 (hex)
        actual: String,
    },

    /// The archive could not be unpacked or did not contain an executable
    #[display("Extraction failed: {}", _0)]
    Extraction(String),

    /// Moving the binary into place failed
    #[display("Install failed: {}", _0)]
    Install(String),

    /// The installed binary could not be started
    #[display("Launch failed: {}", _0)]
    Launch(String),

    /// The child process exited before its health endpoint answered
    #[display("Gateway exited before becoming healthy ({})", _0)]
    ExitedBeforeReady(String),

    /// The health endpoint did not answer before the startup deadline
    #[display("Gateway did not become healthy within {} ms", _0)]
    StartupTimeout(u64),
}

/// Bootstrap error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", kind)]
pub struct BootstrapError {
    /// The error kind
    pub kind: BootstrapErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl BootstrapError {
    /// Create a new BootstrapError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: BootstrapErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BootstrapErrorKind {
        &self.kind
    }
}
