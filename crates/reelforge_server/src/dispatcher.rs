//! Provider dispatch.

use crate::backends::{ChatTarget, FetchedImage, HttpBackends};
use reelforge_bootstrap::{BootstrapPhase, Bootstrapper};
use reelforge_catalog::CatalogBridge;
use reelforge_core::{
    AttachmentPayload, ChatBody, CommandPreset, DEFAULT_GPT4FREE_MODEL, DEFAULT_OLLAMA_URL,
    GenerateBody, GenerationRequest, ImageGenBody, MediaAttachment, Provider, ProviderFamily,
    RequestPolicy, STRUCTURED_PROMPT_NAME, Task, writer_instruction,
};
use reelforge_error::{ReelforgeResult, ValidationError};
use reelforge_process::{CommandRunner, SubprocessInvocation, resolve_executable};
use reelforge_storage::{MergePipeline, TransientFileStore};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// How a generation result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Rendered template only
    Template,
    /// Template sent through a backend
    Generated,
    /// Free-form chat
    Chat,
}

/// Text produced for a chat or generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generated {
    /// Which path produced `text`
    pub mode: GenerationMode,
    /// Output text
    pub text: String,
}

/// Result of a gateway connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// Gateway API root
    pub api_url: String,
    /// Bootstrap phase after the call
    pub phase: BootstrapPhase,
}

/// Whether a known agent CLI can be launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliDiagnostic {
    /// Preset name
    pub command: String,
    /// Resolved successfully
    pub ok: bool,
    /// Executable that would be spawned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    /// Why resolution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes validated requests to the backend their provider names.
///
/// Attachments are written to the transient store only for subprocess agents
/// and removed when the call returns, whatever the outcome. Dropping a call
/// future (the client went away) kills its child process.
#[derive(derive_builder::Builder)]
#[builder(pattern = "owned", setter(into), build_fn(private, name = "build_internal"))]
pub struct Dispatcher {
    policy: RequestPolicy,
    runner: Arc<dyn CommandRunner>,
    uploads: TransientFileStore,
    merger: MergePipeline,
    catalog: Arc<CatalogBridge>,
    backends: HttpBackends,
    gateway: Bootstrapper,
    /// Executable per preset name, replacing the `PATH` lookup
    #[builder(default)]
    command_overrides: HashMap<String, String>,
    #[builder(default = "Duration::from_millis(60_000)")]
    command_timeout: Duration,
    #[builder(default = "2_000_000")]
    max_output_bytes: usize,
}

impl DispatcherBuilder {
    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns error if a required collaborator is missing.
    pub fn build(self) -> Result<Dispatcher, String> {
        self.build_internal().map_err(|e| e.to_string())
    }
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The catalog bridge, for passthrough routes.
    pub fn catalog(&self) -> &CatalogBridge {
        &self.catalog
    }

    /// The gateway bootstrapper.
    pub fn gateway(&self) -> &Bootstrapper {
        &self.gateway
    }

    /// One-shot chat.
    #[instrument(skip(self, body), fields(provider = ?body.backend.provider))]
    pub async fn chat(&self, body: ChatBody) -> ReelforgeResult<Generated> {
        let request = GenerationRequest::chat(body, &self.policy)?;
        let text = self.execute(&request, request.text()).await?;
        Ok(Generated {
            mode: GenerationMode::Chat,
            text,
        })
    }

    /// Render the structured prompt template, then run it through the
    /// provider unless the provider is `none`.
    #[instrument(skip(self, body), fields(provider = ?body.backend.provider))]
    pub async fn generate(&self, body: GenerateBody) -> ReelforgeResult<Generated> {
        let request = GenerationRequest::generate(body, &self.policy)?;
        let Task::Generate { story, fields } = request.task() else {
            return Err(ValidationError::new("Missing story").into());
        };

        let arguments: Map<String, Value> = fields
            .prompt_arguments(story)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let template = self
            .catalog
            .render_prompt_text(STRUCTURED_PROMPT_NAME, arguments)
            .await?;

        if *request.provider() == Provider::None {
            return Ok(Generated {
                mode: GenerationMode::Template,
                text: template,
            });
        }

        let instruction = writer_instruction(&template);
        let text = self.execute(&request, &instruction).await?;
        Ok(Generated {
            mode: GenerationMode::Generated,
            text,
        })
    }

    async fn execute(&self, request: &GenerationRequest, input: &str) -> ReelforgeResult<String> {
        let endpoint = request.endpoint();
        let provider = *request.provider();
        info!(%provider, input_len = input.len(), "Dispatching");

        match provider {
            Provider::None => Ok(input.to_string()),
            Provider::Puter => Err(ValidationError::new(
                "Puter runs in the browser. The server cannot fulfill provider=puter.",
            )
            .into()),
            Provider::Command => self.run_command(request, input).await,
            Provider::Ollama => {
                let base_url = endpoint.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
                let model = required(endpoint.model.as_deref(), "model", provider)?;
                self.backends.ollama(base_url, model, input).await
            }
            Provider::OpenaiCompatible | Provider::ImageGen => {
                let target = ChatTarget {
                    base_url: required(endpoint.base_url.as_deref(), "base_url", provider)?,
                    model: required(endpoint.model.as_deref(), "model", provider)?,
                    api_key: endpoint.api_key.as_deref(),
                };
                self.backends.chat_completion(target, input).await
            }
            Provider::Gpt4free => {
                let api_url = self.gateway.ensure_ready().await?;
                let target = ChatTarget {
                    base_url: &api_url,
                    model: endpoint.model.as_deref().unwrap_or(DEFAULT_GPT4FREE_MODEL),
                    api_key: None,
                };
                self.backends.chat_completion(target, input).await
            }
        }
    }

    async fn run_command(&self, request: &GenerationRequest, input: &str) -> ReelforgeResult<String> {
        let settings = request
            .command()
            .as_ref()
            .ok_or_else(|| ValidationError::new("Missing command for provider=command"))?;
        let program = self.program_for(settings.preset());

        let prefix = match request.task() {
            Task::Chat { .. } => "chat",
            Task::Generate { .. } => "prompt",
        };
        // Held until the child exits; dropping them deletes the files.
        let files = self.uploads.persist_all(request.attachments(), prefix).await?;
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path().to_path_buf()).collect();

        let plan = settings.plan(program, input, &paths);
        let mut builder = SubprocessInvocation::builder();
        builder
            .command(plan.program)
            .args(plan.args)
            .timeout(self.command_timeout)
            .max_output_bytes(self.max_output_bytes);
        if let Some(stdin) = plan.stdin {
            builder.input(stdin.into_bytes());
        }
        let invocation = builder.build()?;

        debug!(command = %invocation.command(), images = paths.len(), "Running agent");
        let output = self.runner.run(&invocation).await;
        drop(files);
        Ok(output?)
    }

    fn program_for(&self, preset: &CommandPreset) -> String {
        self.command_overrides
            .get(preset.command_name())
            .cloned()
            .unwrap_or_else(|| preset.command_name().to_string())
    }

    /// Concatenate uploaded segments in order.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn merge_videos(&self, files: &[AttachmentPayload]) -> ReelforgeResult<MediaAttachment> {
        if files.is_empty() {
            Err(ValidationError::new("No video files provided."))?
        }
        let segments = files
            .iter()
            .map(AttachmentPayload::decode)
            .collect::<ReelforgeResult<Vec<_>>>()?;
        self.merger.merge(&segments).await
    }

    /// One image-generation call; returns the upstream JSON unchanged.
    #[instrument(skip(self, body))]
    pub async fn generate_image(&self, body: ImageGenBody) -> ReelforgeResult<Value> {
        self.policy.check_family(ProviderFamily::HttpEgress)?;
        let (prompt, via_gateway, endpoint) = body.validate()?;
        let api_url = if via_gateway {
            self.gateway.ensure_ready().await?
        } else {
            endpoint.base_url.clone().unwrap_or_default()
        };
        let target = ChatTarget {
            base_url: &api_url,
            model: endpoint.model.as_deref().unwrap_or(DEFAULT_GPT4FREE_MODEL),
            api_key: endpoint.api_key.as_deref(),
        };
        self.backends.image_generation(target, &prompt).await
    }

    /// Bootstrap the gateway now instead of on first use.
    #[instrument(skip(self))]
    pub async fn connect_gateway(&self) -> ReelforgeResult<GatewayStatus> {
        self.policy.check_family(Provider::Gpt4free.family())?;
        let api_url = self.gateway.ensure_ready().await?;
        Ok(GatewayStatus {
            api_url,
            phase: self.gateway.phase(),
        })
    }

    /// Fetch a remote image for the browser.
    pub async fn proxy_image(&self, url: &str) -> ReelforgeResult<FetchedImage> {
        self.backends.fetch_image(url).await
    }

    /// Report where each known agent CLI resolves.
    pub fn cli_diagnostics(&self) -> Vec<CliDiagnostic> {
        CommandPreset::KNOWN
            .iter()
            .map(|preset| {
                let name = preset.command_name().to_string();
                let program = self.program_for(preset);
                match resolve_executable(&program) {
                    Some(path) => CliDiagnostic {
                        command: name,
                        ok: true,
                        resolved: Some(path.display().to_string()),
                        error: None,
                    },
                    None if self.command_overrides.contains_key(&name) => CliDiagnostic {
                        error: Some(format!("Override path is not executable: {}", program)),
                        command: name,
                        ok: false,
                        resolved: None,
                    },
                    None => CliDiagnostic {
                        error: Some(format!("{} not found on PATH", program)),
                        command: name,
                        ok: false,
                        resolved: None,
                    },
                }
            })
            .collect()
    }

    /// Close the catalog channel and stop the gateway.
    pub async fn shutdown(&self) {
        self.catalog.close().await;
        self.gateway.shutdown().await;
    }
}

fn required<'a>(value: Option<&'a str>, field: &str, provider: Provider) -> ReelforgeResult<&'a str> {
    value.ok_or_else(|| {
        ValidationError::new(format!("Missing {} for provider={}", field, provider)).into()
    })
}
