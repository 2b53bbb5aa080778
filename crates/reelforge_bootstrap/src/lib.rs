//! Makes the gpt4free gateway usable.
//!
//! The bootstrapper walks a small state machine:
//!
//! ```text
//! absent → downloading → verifying → (extracting) → installed → starting → ready
//! ```
//!
//! A download whose SHA-256 does not match the expected hash is deleted and
//! never promoted to the install path. Concurrent callers share one in-flight
//! bootstrap instead of racing downloads or launches. The launched gateway is
//! owned by the [`Bootstrapper`] and killed when it is shut down or dropped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod asset;
mod bootstrapper;
mod download;
mod extract;
mod phase;
mod platform;

pub use asset::BinaryAsset;
pub use bootstrapper::{BootstrapConfig, BootstrapConfigBuilder, Bootstrapper};
pub use download::download_verified;
pub use extract::extract_executable;
pub use phase::BootstrapPhase;
pub use platform::{DEFAULT_RELEASE_BASE, Platform};
