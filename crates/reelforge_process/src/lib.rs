//! Subprocess execution with a wall-clock timeout and an output ceiling.
//!
//! A child never outlives the future driving it: timeouts and oversized
//! output kill it immediately, and dropping the future (for example when an
//! HTTP client disconnects) kills it as well.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod invocation;
mod resolve;
mod runner;

pub use invocation::{SubprocessInvocation, SubprocessInvocationBuilder};
pub use resolve::resolve_executable;
pub use runner::{CommandRunner, KillReason, ProcessRunner};
