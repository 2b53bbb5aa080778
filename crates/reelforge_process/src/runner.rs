//! The subprocess runner.

use crate::SubprocessInvocation;
use async_trait::async_trait;
use reelforge_error::{SubprocessError, SubprocessErrorKind};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const READ_CHUNK: usize = 8 * 1024;

/// How long pipes may stay silent after the child exits before they are abandoned.
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// Why the runner killed a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum KillReason {
    /// The wall-clock limit elapsed
    Timeout,
    /// Stdout or stderr passed the output ceiling
    OutputTooLarge,
}

/// Something that can execute a [`SubprocessInvocation`].
///
/// The dispatcher depends on this trait so tests can count spawns.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and return trimmed stdout.
    async fn run(&self, invocation: &SubprocessInvocation) -> Result<String, SubprocessError>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

enum Exit {
    Status(ExitStatus),
    Killed(KillReason),
}

struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(command = %invocation.command(), args = invocation.args().len()))]
    async fn run(&self, invocation: &SubprocessInvocation) -> Result<String, SubprocessError> {
        let command = invocation.command().clone();
        let limit = *invocation.max_output_bytes();

        let mut child = spawn(invocation)?;
        debug!(pid = ?child.id(), "Spawned child process");

        let writer = match (child.stdin.take(), invocation.input().clone()) {
            (Some(mut stdin), Some(bytes)) => Some(tokio::spawn(async move {
                // The child may exit without reading everything; a broken pipe is its business.
                if let Err(e) = stdin.write_all(&bytes).await {
                    debug!(error = %e, "stdin closed early");
                }
                drop(stdin);
            })),
            _ => None,
        };

        let mut captured = Captured {
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        let exit = supervise(&mut child, &mut captured, invocation).await;
        if let Some(writer) = writer {
            writer.abort();
        }

        match exit? {
            Exit::Killed(reason) => {
                warn!(%reason, "Killing child process");
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Child already gone");
                }
                if let Err(e) = child.wait().await {
                    debug!(error = %e, "Failed to reap child");
                }
                let stderr = clip(&captured.stderr, limit);
                let kind = match reason {
                    KillReason::Timeout => SubprocessErrorKind::Timeout {
                        command,
                        timeout_ms: invocation.timeout().as_millis() as u64,
                        stderr,
                    },
                    KillReason::OutputTooLarge => SubprocessErrorKind::OutputTooLarge {
                        command,
                        limit,
                        stderr,
                    },
                };
                Err(SubprocessError::new(kind))
            }
            Exit::Status(status) if status.success() => {
                debug!(bytes = captured.stdout.len(), "Child exited cleanly");
                Ok(clip(&captured.stdout, limit))
            }
            Exit::Status(status) => {
                debug!(code = ?status.code(), "Child exited with failure");
                Err(SubprocessError::new(SubprocessErrorKind::NonZeroExit {
                    command,
                    code: status.code(),
                    stderr: clip(&captured.stderr, limit),
                    stdout: clip(&captured.stdout, limit),
                }))
            }
        }
    }
}

fn spawn(invocation: &SubprocessInvocation) -> Result<Child, SubprocessError> {
    let mut cmd = Command::new(invocation.command());
    cmd.args(invocation.args())
        .stdin(if invocation.input().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.spawn().map_err(|e| {
        let command = invocation.command().clone();
        if e.kind() == std::io::ErrorKind::NotFound {
            SubprocessError::new(SubprocessErrorKind::NotFound(command))
        } else {
            SubprocessError::new(SubprocessErrorKind::Spawn {
                command,
                reason: e.to_string(),
            })
        }
    })
}

/// Drain both pipes while watching for exit, all under one deadline.
///
/// Pipes normally close when the child exits. A grandchild can inherit them and
/// keep them open, so once the child has exited the pipes are read only until
/// they go quiet for [`EXIT_GRACE`].
async fn supervise(
    child: &mut Child,
    captured: &mut Captured,
    invocation: &SubprocessInvocation,
) -> Result<Exit, SubprocessError> {
    let limit = *invocation.max_output_bytes();
    let io_error = |e: std::io::Error| {
        SubprocessError::new(SubprocessErrorKind::Io {
            command: invocation.command().clone(),
            reason: e.to_string(),
        })
    };

    let mut stdout = child.stdout.take().map(boxed);
    let mut stderr = child.stderr.take().map(boxed);
    let mut out_chunk = vec![0u8; READ_CHUNK];
    let mut err_chunk = vec![0u8; READ_CHUNK];

    let deadline = tokio::time::sleep(*invocation.timeout());
    tokio::pin!(deadline);
    let quiet = tokio::time::sleep(EXIT_GRACE);
    tokio::pin!(quiet);
    let mut status: Option<ExitStatus> = None;

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_chunk), if stdout.is_some() => {
                match read.map_err(io_error)? {
                    0 => stdout = None,
                    n => {
                        captured.stdout.extend_from_slice(&out_chunk[..n]);
                        if captured.stdout.len() > limit {
                            return Ok(Exit::Killed(KillReason::OutputTooLarge));
                        }
                    }
                }
                quiet.as_mut().reset(Instant::now() + EXIT_GRACE);
            }
            read = read_some(&mut stderr, &mut err_chunk), if stderr.is_some() => {
                match read.map_err(io_error)? {
                    0 => stderr = None,
                    n => {
                        captured.stderr.extend_from_slice(&err_chunk[..n]);
                        if captured.stderr.len() > limit {
                            return Ok(Exit::Killed(KillReason::OutputTooLarge));
                        }
                    }
                }
                quiet.as_mut().reset(Instant::now() + EXIT_GRACE);
            }
            exited = child.wait(), if status.is_none() => {
                status = Some(exited.map_err(io_error)?);
                quiet.as_mut().reset(Instant::now() + EXIT_GRACE);
            }
            _ = &mut quiet, if status.is_some() => {
                debug!("Child exited but its output pipes are still held open");
                break;
            }
            _ = &mut deadline => {
                return Ok(status.map_or(Exit::Killed(KillReason::Timeout), Exit::Status));
            }
        }
    }

    if let Some(status) = status {
        return Ok(Exit::Status(status));
    }
    tokio::select! {
        status = child.wait() => Ok(Exit::Status(status.map_err(io_error)?)),
        _ = &mut deadline => Ok(Exit::Killed(KillReason::Timeout)),
    }
}

type Pipe = Box<dyn AsyncRead + Send + Unpin>;

fn boxed<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Pipe {
    Box::new(reader)
}

async fn read_some(pipe: &mut Option<Pipe>, chunk: &mut [u8]) -> std::io::Result<usize> {
    match pipe {
        Some(reader) => reader.read(chunk).await,
        None => Ok(0),
    }
}

/// Lossy UTF-8, capped at `limit` bytes, trimmed.
fn clip(bytes: &[u8], limit: usize) -> String {
    let end = bytes.len().min(limit);
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_caps_and_trims() {
        assert_eq!(clip(b"  hello world \n", 100), "hello world");
        assert_eq!(clip(b"abcdef", 3), "abc");
    }

    #[test]
    fn test_kill_reason_labels() {
        assert_eq!(KillReason::Timeout.to_string(), "timeout");
        assert_eq!(KillReason::OutputTooLarge.to_string(), "output_too_large");
    }
}
