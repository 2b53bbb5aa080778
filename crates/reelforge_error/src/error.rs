//! Top-level error wrapper types.

use crate::{
    BootstrapError, CatalogError, ConfigError, FeatureDisabledError, HttpError, MergeError,
    StorageError, SubprocessError, ValidationError,
};

/// Every failure the orchestrator can surface to a caller.
///
/// # Examples
///
/// ```
/// use reelforge_error::{ReelforgeError, ReelforgeErrorKind, ValidationError};
///
/// let err: ReelforgeError = ValidationError::new("Missing story").into();
/// assert!(matches!(err.kind(), ReelforgeErrorKind::Validation(_)));
/// assert_eq!(err.to_string(), "Missing story");
/// ```
#[derive(Debug, Clone, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ReelforgeErrorKind {
    /// Bad, missing or oversized input
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Provider family switched off by configuration
    #[from(FeatureDisabledError)]
    FeatureDisabled(FeatureDisabledError),
    /// Child process failure
    #[from(SubprocessError)]
    Subprocess(SubprocessError),
    /// Release binary bootstrap failure
    #[from(BootstrapError)]
    Bootstrap(BootstrapError),
    /// Upstream HTTP backend failure
    #[from(HttpError)]
    Http(HttpError),
    /// Scratch storage failure
    #[from(StorageError)]
    Storage(StorageError),
    /// Media merge failure
    #[from(MergeError)]
    Merge(MergeError),
    /// Catalog channel failure
    #[from(CatalogError)]
    Catalog(CatalogError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Reelforge error with kind discrimination.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", _0)]
pub struct ReelforgeError(Box<ReelforgeErrorKind>);

impl ReelforgeError {
    /// Create a new error from a kind.
    pub fn new(kind: ReelforgeErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ReelforgeErrorKind {
        &self.0
    }

    /// Source location recorded where the error was raised, for logging.
    pub fn location(&self) -> (&'static str, u32) {
        match self.kind() {
            ReelforgeErrorKind::Validation(e) => (e.file, e.line),
            ReelforgeErrorKind::FeatureDisabled(e) => (e.file, e.line),
            ReelforgeErrorKind::Subprocess(e) => (e.file, e.line),
            ReelforgeErrorKind::Bootstrap(e) => (e.file, e.line),
            ReelforgeErrorKind::Http(e) => (e.file, e.line),
            ReelforgeErrorKind::Storage(e) => (e.file, e.line),
            ReelforgeErrorKind::Merge(e) => (e.file, e.line),
            ReelforgeErrorKind::Catalog(e) => (e.file, e.line),
            ReelforgeErrorKind::Config(e) => (e.file, e.line),
        }
    }
}

// Generic From implementation for any type that converts to ReelforgeErrorKind
impl<T> From<T> for ReelforgeError
where
    T: Into<ReelforgeErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Reelforge operations.
pub type ReelforgeResult<T> = std::result::Result<T, ReelforgeError>;
