//! Observable bootstrap state.

use serde::Serialize;

/// Where the bootstrap state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BootstrapPhase {
    /// Nothing installed yet
    #[default]
    Absent,
    /// Fetching the release asset
    Downloading,
    /// Comparing the content hash
    Verifying,
    /// Unpacking an archived release
    Extracting,
    /// Binary in place, not running
    Installed,
    /// Launched, waiting for the health probe
    Starting,
    /// Health probe succeeded
    Ready,
    /// The last attempt failed; the next call retries
    Failed,
}
