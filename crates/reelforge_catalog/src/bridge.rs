//! FIFO-serialized catalog client.

use crate::CatalogConnector;
use crate::connector::CatalogChannel;
use crate::rpc::{self, Incoming, Request};
use reelforge_error::{CatalogError, CatalogErrorKind};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{Instrument, debug, info, instrument, warn};

/// Serialized client for the catalog channel.
///
/// Calls hold the channel from their request write until their response is
/// read. The lock is a fair FIFO queue, so calls run in submission order and a
/// failed or abandoned call releases the channel to the next one.
pub struct CatalogBridge {
    connector: Arc<dyn CatalogConnector>,
    connection: Arc<Mutex<Option<Connection>>>,
    call_timeout: Duration,
}

struct Connection {
    channel: CatalogChannel,
    next_id: u64,
}

impl std::fmt::Debug for CatalogBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogBridge")
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl CatalogBridge {
    /// Default limit for one request/response round trip.
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a bridge. Nothing is spawned until the first call.
    pub fn new(connector: Arc<dyn CatalogConnector>) -> Self {
        Self {
            connector,
            connection: Arc::new(Mutex::new(None)),
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// `prompts/list`
    pub async fn list_prompts(&self) -> Result<Value, CatalogError> {
        self.call("prompts/list", json!({})).await
    }

    /// `prompts/get` with string arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, CatalogError> {
        self.call("prompts/get", json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// Render a prompt and return the text of its first message.
    pub async fn render_prompt_text(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, CatalogError> {
        let result = self.get_prompt(name, arguments).await?;
        let content = result.pointer("/messages/0/content");
        let text = content
            .filter(|c| c.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(CatalogError::new(CatalogErrorKind::Protocol(format!(
                "Failed to build prompt template '{}'",
                name
            ))));
        }
        Ok(text.to_string())
    }

    /// `tools/list`
    pub async fn list_tools(&self) -> Result<Value, CatalogError> {
        self.call("tools/list", json!({})).await
    }

    /// `tools/call`
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, CatalogError> {
        self.call("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// `resources/list`
    pub async fn list_resources(&self) -> Result<Value, CatalogError> {
        self.call("resources/list", json!({})).await
    }

    /// `resources/read`
    pub async fn read_resource(&self, uri: &str) -> Result<Value, CatalogError> {
        self.call("resources/read", json!({ "uri": uri })).await
    }

    /// Close the channel and stop the catalog process. A later call reconnects.
    pub async fn close(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(mut connection) = connection {
            if let Some(child) = connection.channel.child.as_mut() {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to stop catalog process");
                }
            }
            info!("Closed catalog channel");
        }
    }

    /// Run one call in queue order.
    ///
    /// The round trip runs on its own task holding the channel, so a caller
    /// dropped mid-call never leaves part of a message in the pipe. The
    /// abandoned call finishes, its result is discarded and the next call
    /// starts on a clean stream.
    #[instrument(skip(self, params))]
    async fn call(&self, method: &str, params: Value) -> Result<Value, CatalogError> {
        let slot = Arc::clone(&self.connection).lock_owned().await;
        let connector = Arc::clone(&self.connector);
        let call_timeout = self.call_timeout;
        let method = method.to_string();

        let task = tokio::spawn(
            async move { round_trip(slot, connector.as_ref(), call_timeout, &method, params).await }
                .in_current_span(),
        );
        task.await.unwrap_or_else(|e| {
            Err(CatalogError::new(CatalogErrorKind::Transport(format!(
                "catalog call aborted: {}",
                e
            ))))
        })
    }
}

async fn round_trip(
    mut slot: OwnedMutexGuard<Option<Connection>>,
    connector: &dyn CatalogConnector,
    call_timeout: Duration,
    method: &str,
    params: Value,
) -> Result<Value, CatalogError> {
    if slot.is_none() {
        *slot = Some(Connection::open(connector, call_timeout).await?);
    }
    let Some(connection) = slot.as_mut() else {
        return Err(CatalogError::new(CatalogErrorKind::Connect(
            "catalog channel unavailable".to_string(),
        )));
    };

    let outcome = tokio::time::timeout(call_timeout, connection.request(method, params))
        .await
        .unwrap_or_else(|_| {
            Err(CatalogError::new(CatalogErrorKind::Transport(format!(
                "{} timed out after {:?}",
                method, call_timeout
            ))))
        });

    if let Err(e) = &outcome {
        if e.is_fatal_to_channel() {
            warn!(error = %e, "Dropping catalog channel");
            *slot = None;
        }
    }
    outcome
}

impl Connection {
    async fn open(
        connector: &dyn CatalogConnector,
        call_timeout: Duration,
    ) -> Result<Connection, CatalogError> {
        let channel = connector.connect().await?;
        let mut connection = Connection {
            channel,
            next_id: 0,
        };
        let handshake = async {
            let init = connection
                .request(
                    "initialize",
                    json!({
                        "protocolVersion": rpc::PROTOCOL_VERSION,
                        "capabilities": {},
                        "clientInfo": { "name": "reelforge", "version": env!("CARGO_PKG_VERSION") }
                    }),
                )
                .await?;
            connection
                .send(&Request::notification("notifications/initialized").to_line()?)
                .await?;
            Ok::<Value, CatalogError>(init)
        };
        let init = tokio::time::timeout(call_timeout, handshake)
            .await
            .map_err(|_| {
                CatalogError::new(CatalogErrorKind::Connect("initialize timed out".to_string()))
            })?
            .map_err(|e| CatalogError::new(CatalogErrorKind::Connect(e.to_string())))?;

        debug!(server = ?init.get("serverInfo"), "Catalog initialized");
        Ok(connection)
    }

    async fn send(&mut self, line: &str) -> Result<(), CatalogError> {
        let transport = |e: std::io::Error| CatalogError::new(CatalogErrorKind::Transport(e.to_string()));
        self.channel
            .writer
            .write_all(line.as_bytes())
            .await
            .map_err(transport)?;
        self.channel.writer.flush().await.map_err(transport)
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, CatalogError> {
        self.next_id += 1;
        let id = self.next_id;
        self.send(&Request::call(id, method, params).to_line()?).await?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .channel
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| CatalogError::new(CatalogErrorKind::Transport(e.to_string())))?;
            if read == 0 {
                return Err(CatalogError::new(CatalogErrorKind::Transport(
                    "catalog closed the channel".to_string(),
                )));
            }
            if line.trim().is_empty() {
                continue;
            }
            match rpc::classify(line.trim())? {
                Incoming::Response { id: got, outcome } if got == id => return outcome,
                Incoming::Response { id: got, .. } => {
                    debug!(expected = id, got, "Discarding response to an abandoned call");
                }
                Incoming::Request { id: request_id, method } => {
                    debug!(%method, "Declining catalog request");
                    let reply = rpc::method_not_found(request_id);
                    self.send(&format!("{}\n", reply)).await?;
                }
                Incoming::Other => {}
            }
        }
    }
}
