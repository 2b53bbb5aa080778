//! Request validation errors.

/// A request was rejected before any side effect was attempted.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", message)]
pub struct ValidationError {
    /// Human-readable reason, returned to the caller verbatim
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_error::ValidationError;
    ///
    /// let err = ValidationError::new("Missing prompt");
    /// assert_eq!(err.to_string(), "Missing prompt");
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
