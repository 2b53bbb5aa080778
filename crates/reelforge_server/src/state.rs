//! Shared handler state.

use crate::{Dispatcher, ExtensionQueue, HttpBackends, ServerConfig};
use reelforge_bootstrap::Bootstrapper;
use reelforge_catalog::{CatalogBridge, ProcessConnector};
use reelforge_core::CommandPreset;
use reelforge_error::{ConfigError, ReelforgeResult};
use reelforge_process::{CommandRunner, ProcessRunner};
use reelforge_storage::{MergePipeline, TransientFileStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Budget for one ffmpeg concatenation.
const MERGE_TIMEOUT: Duration = Duration::from_secs(300);

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    queue: Arc<ExtensionQueue>,
}

impl AppState {
    /// Wrap a dispatcher with an empty extension queue.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            queue: Arc::new(ExtensionQueue::new()),
        }
    }

    /// Wire real collaborators from configuration. Nothing is spawned or
    /// downloaded until a request needs it.
    #[instrument(skip(config))]
    pub fn from_config(config: &ServerConfig) -> ReelforgeResult<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
        let mut connector =
            ProcessConnector::new(config.catalog_command().clone(), config.catalog_arg_list());
        if let Some(dir) = config.catalog_working_dir() {
            connector = connector.current_dir(dir.clone());
        }
        let gateway = Bootstrapper::new(config.bootstrap_config()?)?;
        let merger = MergePipeline::new(
            config.ffmpeg_path().clone(),
            config.merge_dir(),
            Arc::clone(&runner),
            MERGE_TIMEOUT,
        );
        let overrides: HashMap<String, String> = CommandPreset::KNOWN
            .iter()
            .filter_map(|preset| {
                config
                    .command_override(preset)
                    .map(|path| (preset.command_name().to_string(), path.to_string()))
            })
            .collect();

        let dispatcher = Dispatcher::builder()
            .policy(config.request_policy())
            .runner(runner)
            .uploads(TransientFileStore::new(config.uploads_dir()))
            .merger(merger)
            .catalog(Arc::new(CatalogBridge::new(Arc::new(connector))))
            .backends(HttpBackends::new(config.command_timeout())?)
            .gateway(gateway)
            .command_overrides(overrides)
            .command_timeout(config.command_timeout())
            .max_output_bytes(*config.max_output_bytes())
            .build()
            .map_err(|e| ConfigError::new(format!("dispatcher: {}", e)))?;

        tracing::info!(
            command_llm = config.enable_command_llm(),
            http_llm = config.enable_http_llm(),
            data_dir = %config.data_dir().display(),
            "Dispatcher ready"
        );
        Ok(Self::new(dispatcher))
    }

    /// The provider dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The browser companion mailbox.
    pub fn queue(&self) -> &ExtensionQueue {
        &self.queue
    }

    /// Release the catalog process and the gateway.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}
