//! How the bridge reaches the catalog.

use async_trait::async_trait;
use reelforge_error::{CatalogError, CatalogErrorKind};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, instrument};

/// An open, ordered, bidirectional pipe to the catalog.
pub struct CatalogChannel {
    pub(crate) reader: Box<dyn AsyncBufRead + Send + Unpin>,
    pub(crate) writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub(crate) child: Option<Child>,
}

impl CatalogChannel {
    /// Wrap arbitrary streams, e.g. an in-memory duplex in tests.
    pub fn new(
        reader: impl AsyncBufRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Attach the process serving this channel so it is killed with it.
    pub fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }
}

impl std::fmt::Debug for CatalogChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogChannel")
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish()
    }
}

/// Opens catalog channels.
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    /// Open a fresh channel.
    async fn connect(&self) -> Result<CatalogChannel, CatalogError>;
}

/// Spawns the catalog as a child process and talks over its stdio.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    command: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl ProcessConnector {
    /// Run `command args...` for each connection.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            current_dir: None,
        }
    }

    /// Working directory for the catalog process.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl CatalogConnector for ProcessConnector {
    #[instrument(skip(self), fields(command = %self.command))]
    async fn connect(&self) -> Result<CatalogChannel, CatalogError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let connect_err = |reason: String| CatalogError::new(CatalogErrorKind::Connect(reason));
        let mut child = cmd
            .spawn()
            .map_err(|e| connect_err(format!("{}: {}", self.command, e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| connect_err("catalog stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| connect_err("catalog stdout unavailable".to_string()))?;

        info!(pid = ?child.id(), "Started catalog process");
        Ok(CatalogChannel::new(BufReader::new(stdout), stdin).with_child(child))
    }
}
