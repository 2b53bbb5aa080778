//! Error types for the Reelforge orchestrator.
//!
//! Every concern has its own error type so callers can tell a rejected request
//! apart from a dead subprocess or a tampered download.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use reelforge_error::{ReelforgeResult, ValidationError};
//!
//! fn check_story(story: &str) -> ReelforgeResult<()> {
//!     if story.trim().is_empty() {
//!         Err(ValidationError::new("Missing story"))?
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_story("").is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bootstrap;
mod catalog;
mod config;
mod error;
mod feature;
mod http;
mod merge;
mod storage;
mod subprocess;
mod validation;

pub use bootstrap::{BootstrapError, BootstrapErrorKind};
pub use catalog::{CatalogError, CatalogErrorKind};
pub use config::ConfigError;
pub use error::{ReelforgeError, ReelforgeErrorKind, ReelforgeResult};
pub use feature::FeatureDisabledError;
pub use http::{HttpError, HttpErrorKind};
pub use merge::{MergeError, MergeErrorKind};
pub use storage::{StorageError, StorageErrorKind};
pub use subprocess::{SubprocessError, SubprocessErrorKind};
pub use validation::ValidationError;
