//! Subprocess execution errors.

/// Why a child process did not produce a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SubprocessErrorKind {
    /// The executable could not be found
    #[display("Command not found: {}", _0)]
    NotFound(String),

    /// The process could not be started for another reason
    #[display("Failed to spawn {}: {}", command, reason)]
    Spawn {
        /// Command that failed to start
        command: String,
        /// Underlying OS error
        reason: String,
    },

    /// Reading or waiting on the process failed
    #[display("I/O error while running {}: {}", command, reason)]
    Io {
        /// Command being run
        command: String,
        /// Underlying OS error
        reason: String,
    },

    /// The process was killed after exceeding its wall-clock budget
    #[display("{} timed out after {} ms and was killed.{}", command, timeout_ms, diagnostics_suffix(stderr))]
    Timeout {
        /// Command being run
        command: String,
        /// Budget that elapsed
        timeout_ms: u64,
        /// Captured stderr, truncated to the output ceiling
        stderr: String,
    },

    /// The process was killed after writing more than the output ceiling
    #[display("{} exceeded the output limit of {} bytes and was killed.{}", command, limit, diagnostics_suffix(stderr))]
    OutputTooLarge {
        /// Command being run
        command: String,
        /// Ceiling that was breached
        limit: usize,
        /// Captured stderr, truncated to the output ceiling
        stderr: String,
    },

    /// The process exited unsuccessfully
    #[display("{} failed (exit {}).{}{}", command, exit_label(code), diagnostics_suffix(stderr), stdout_suffix(stdout))]
    NonZeroExit {
        /// Command being run
        command: String,
        /// Exit code, absent when terminated by a signal
        code: Option<i32>,
        /// Trimmed stderr, truncated to the output ceiling
        stderr: String,
        /// Trimmed stdout, truncated to the output ceiling
        stdout: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

fn diagnostics_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n\nstderr:\n{}", stderr)
    }
}

fn stdout_suffix(stdout: &str) -> String {
    if stdout.is_empty() {
        String::new()
    } else {
        format!("\n\nstdout:\n{}", stdout)
    }
}

/// Subprocess error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{}", kind)]
pub struct SubprocessError {
    /// The error kind
    pub kind: SubprocessErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl SubprocessError {
    /// Create a new SubprocessError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SubprocessErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the process was killed by the timeout watchdog.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, SubprocessErrorKind::Timeout { .. })
    }

    /// True when the process was killed for writing too much output.
    pub fn is_output_too_large(&self) -> bool {
        matches!(self.kind, SubprocessErrorKind::OutputTooLarge { .. })
    }
}
