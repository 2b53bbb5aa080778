//! A single bounded subprocess call.

use reelforge_error::{SubprocessError, SubprocessErrorKind};
use std::time::Duration;

/// Everything needed to run one child process.
///
/// # Examples
///
/// ```
/// use reelforge_process::SubprocessInvocation;
/// use std::time::Duration;
///
/// let invocation = SubprocessInvocation::builder()
///     .command("gemini")
///     .args(vec!["--model".to_string(), "flash".to_string()])
///     .input(b"hello".to_vec())
///     .timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(invocation.command(), "gemini");
/// assert_eq!(*invocation.max_output_bytes(), 2_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct SubprocessInvocation {
    /// Executable name or path
    command: String,
    /// Argument vector
    #[builder(default)]
    args: Vec<String>,
    /// Bytes written to stdin before it is closed; `None` leaves stdin null
    #[builder(default, setter(strip_option))]
    input: Option<Vec<u8>>,
    /// Wall-clock limit measured from spawn
    #[builder(default = "Duration::from_millis(60_000)")]
    timeout: Duration,
    /// Ceiling applied to stdout and stderr independently
    #[builder(default = "2_000_000")]
    max_output_bytes: usize,
}

impl SubprocessInvocation {
    /// Start building an invocation.
    pub fn builder() -> SubprocessInvocationBuilder {
        SubprocessInvocationBuilder::default()
    }
}

impl SubprocessInvocationBuilder {
    /// Build the invocation.
    ///
    /// # Errors
    ///
    /// Returns a spawn error if no command was given.
    #[track_caller]
    pub fn build(&self) -> Result<SubprocessInvocation, SubprocessError> {
        self.build_internal().map_err(|e| {
            SubprocessError::new(SubprocessErrorKind::Spawn {
                command: self.command.clone().unwrap_or_default(),
                reason: e.to_string(),
            })
        })
    }
}
