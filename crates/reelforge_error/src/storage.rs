//! Scratch storage errors.

/// Specific storage error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create a scratch directory
    #[display("Failed to create directory: {}", _0)]
    DirectoryCreation(String),

    /// Failed to write a file
    #[display("Failed to write file: {}", _0)]
    Write(String),

    /// Failed to read a file
    #[display("Failed to read file: {}", _0)]
    Read(String),

    /// Failed to remove a file or directory
    #[display("Failed to remove: {}", _0)]
    Remove(String),

    /// An uploaded payload could not be decoded
    #[display("Invalid payload: {}", _0)]
    InvalidPayload(String),
}

/// Storage error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {}", kind)]
pub struct StorageError {
    /// The error kind
    pub kind: StorageErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl StorageError {
    /// Create a new StorageError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
