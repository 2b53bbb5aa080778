//! Upstream HTTP errors.

/// How a call to an HTTP-compatible backend went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum HttpErrorKind {
    /// The request never produced a response
    #[display("Request to {} failed: {}", url, reason)]
    Request {
        /// Target URL
        url: String,
        /// Transport error text
        reason: String,
    },

    /// The backend answered with a non-2xx status
    #[display("HTTP {} from {}\n{}", status, url, body)]
    Status {
        /// Status code
        status: u16,
        /// Target URL
        url: String,
        /// Response body, truncated
        body: String,
    },

    /// The backend answered 2xx with an unusable payload
    #[display("Malformed response from {}: {}", url, reason)]
    MalformedResponse {
        /// Target URL
        url: String,
        /// What was missing or unparseable
        reason: String,
    },
}

/// Upstream HTTP error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", kind)]
pub struct HttpError {
    /// The error kind
    pub kind: HttpErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl HttpError {
    /// Longest response body echoed back in an error message.
    pub const MAX_BODY_ECHO: usize = 2_000;

    /// Create a new HttpError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: HttpErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Build a `Status` error, bounding the echoed body.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_error::HttpError;
    ///
    /// let body = "x".repeat(10_000);
    /// let err = HttpError::status(500, "http://localhost/v1", &body);
    /// assert!(err.to_string().len() < 2_200);
    /// ```
    #[track_caller]
    pub fn status(status: u16, url: impl Into<String>, body: &str) -> Self {
        Self::new(HttpErrorKind::Status {
            status,
            url: url.into(),
            body: truncate_chars(body.trim(), Self::MAX_BODY_ECHO),
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
