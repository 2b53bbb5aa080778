//! Media merge errors.

/// Specific merge error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum MergeErrorKind {
    /// The concatenation utility is not installed where we looked
    #[display("ffmpeg not found at '{}'. Install ffmpeg or set FFMPEG_PATH.", _0)]
    ToolMissing(String),

    /// The concatenation utility ran and failed
    #[display("ffmpeg failed: {}", _0)]
    ToolFailed(String),

    /// Nothing to merge
    #[display("No video segments to merge")]
    NoSegments,
}

/// Merge error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", kind)]
pub struct MergeError {
    /// The error kind
    pub kind: MergeErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl MergeError {
    /// Create a new MergeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MergeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
