//! Errors from the prompt/tool catalog channel.

/// Specific catalog error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CatalogErrorKind {
    /// The catalog process could not be started or initialized
    #[display("Catalog connection failed: {}", _0)]
    Connect(String),

    /// Reading or writing the channel failed
    #[display("Catalog transport error: {}", _0)]
    Transport(String),

    /// The catalog sent something that is not valid JSON-RPC
    #[display("Catalog protocol error: {}", _0)]
    Protocol(String),

    /// The catalog answered with a JSON-RPC error object
    #[display("Catalog error {}: {}", code, message)]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the catalog
        message: String,
    },
}

/// Catalog error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", kind)]
pub struct CatalogError {
    /// The error kind
    pub kind: CatalogErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl CatalogError {
    /// Create a new CatalogError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CatalogErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the channel itself is broken and should be re-established.
    pub fn is_fatal_to_channel(&self) -> bool {
        matches!(
            self.kind,
            CatalogErrorKind::Connect(_) | CatalogErrorKind::Transport(_) | CatalogErrorKind::Protocol(_)
        )
    }
}
