//! Wire bodies for `/api/chat`, `/api/generate` and `/api/generate-image`, and
//! their validated form.

use crate::{
    AttachmentPayload, CodexSession, CommandPreset, CommandSettings, MediaAttachment, Provider,
    ProviderFamily, StoryFields,
};
use reelforge_error::{FeatureDisabledError, ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};

/// Default Ollama endpoint when the request names none.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model requested from the gpt4free gateway.
pub const DEFAULT_GPT4FREE_MODEL: &str = "gpt-4o-mini";

/// Connection settings for an HTTP inference endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Endpoint root, without the API path
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub base_url: Option<String>,
    /// Model identifier
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub model: Option<String>,
    /// Bearer token
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub api_key: Option<String>,
    /// `llm` or `image` for image_gen endpoints
    #[serde(default, rename = "type", deserialize_with = "crate::lenient::text")]
    pub kind: Option<String>,
}

/// Settings for the bootstrapped gpt4free gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpt4FreeSettings {
    /// Model identifier understood by the gateway
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub model: Option<String>,
}

/// Per-provider sub-configs. Top-level `base_url`/`model`/`api_key` are
/// accepted as a fallback for older clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    #[allow(missing_docs)]
    pub ollama: Option<EndpointSettings>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub openai_compatible: Option<EndpointSettings>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub image_gen: Option<EndpointSettings>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub gpt4free: Option<Gpt4FreeSettings>,
    /// Fallback endpoint root
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub base_url: Option<String>,
    /// Fallback model
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub model: Option<String>,
    /// Fallback API key
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub api_key: Option<String>,
}

impl ProviderSettings {
    /// Endpoint settings for an HTTP provider, nested values winning over the
    /// top-level fallbacks.
    pub fn endpoint(&self, provider: Provider) -> EndpointSettings {
        let nested = match provider {
            Provider::Ollama => self.ollama.clone(),
            Provider::OpenaiCompatible => self.openai_compatible.clone(),
            Provider::ImageGen => self.image_gen.clone(),
            Provider::Gpt4free => self.gpt4free.clone().map(|g| EndpointSettings {
                model: g.model,
                ..Default::default()
            }),
            Provider::None | Provider::Command | Provider::Puter => None,
        }
        .unwrap_or_default();
        EndpointSettings {
            base_url: nested.base_url.or_else(|| self.base_url.clone()),
            model: nested.model.or_else(|| self.model.clone()),
            api_key: nested.api_key.or_else(|| self.api_key.clone()),
            kind: nested.kind,
        }
    }
}

/// Backend selection fields shared by chat and generate bodies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSelection {
    /// Provider tag
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub provider: Option<String>,
    /// Agent CLI for `provider=command`
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub command: Option<String>,
    /// Caller-supplied arguments; always rejected
    #[serde(default, deserialize_with = "crate::lenient::strings")]
    pub args: Vec<String>,
    #[serde(default, deserialize_with = "crate::lenient::text")]
    #[allow(missing_docs)]
    pub codex_model: Option<String>,
    /// `new` or `resume_last`
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub codex_session: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::text")]
    #[allow(missing_docs)]
    pub gemini_model: Option<String>,
    #[serde(default, deserialize_with = "crate::lenient::text")]
    #[allow(missing_docs)]
    pub agent_model: Option<String>,
    /// Inline attachments
    #[serde(default, deserialize_with = "crate::lenient::objects")]
    pub images: Vec<AttachmentPayload>,
    /// Provider sub-configs
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

/// `POST /api/chat` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBody {
    /// Free-form prompt
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub prompt: Option<String>,
    /// Backend selection
    #[serde(flatten)]
    pub backend: BackendSelection,
}

/// `POST /api/generate` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateBody {
    /// Free-form story
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub story: Option<String>,
    /// Structured constraints
    #[serde(flatten)]
    pub fields: StoryFields,
    /// Backend selection
    #[serde(flatten)]
    pub backend: BackendSelection,
}

/// Limits and feature gates applied while validating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Summed decoded attachment bytes allowed per request
    pub max_attachment_bytes: usize,
    /// Subprocess agents enabled (`ENABLE_COMMAND_LLM`)
    pub command_llm: bool,
    /// Outbound HTTP providers enabled (`ENABLE_HTTP_LLM`)
    pub http_llm: bool,
}

impl RequestPolicy {
    /// Attachment ceiling.
    pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

    /// Gate a provider family.
    #[track_caller]
    pub fn check_family(&self, family: ProviderFamily) -> ReelforgeResult<()> {
        match family {
            ProviderFamily::Subprocess if !self.command_llm => {
                Err(FeatureDisabledError::new("ENABLE_COMMAND_LLM", "Command LLM").into())
            }
            ProviderFamily::HttpEgress if !self.http_llm => {
                Err(FeatureDisabledError::new("ENABLE_HTTP_LLM", "HTTP LLM").into())
            }
            _ => Ok(()),
        }
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            max_attachment_bytes: Self::MAX_ATTACHMENT_BYTES,
            command_llm: false,
            http_llm: false,
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// One-shot chat
    Chat {
        /// Prompt sent verbatim
        prompt: String,
    },
    /// Template-guided generation
    Generate {
        /// Story rendered into the template
        story: String,
        /// Structured constraints
        fields: StoryFields,
    },
}

/// A validated, immutable generation request.
///
/// Construction performs every check that does not need I/O, so a value of
/// this type never triggers a rejected side effect.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct GenerationRequest {
    task: Task,
    provider: Provider,
    command: Option<CommandSettings>,
    endpoint: EndpointSettings,
    attachments: Vec<MediaAttachment>,
}

impl GenerationRequest {
    /// Validate a chat body.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_core::{ChatBody, GenerationRequest, RequestPolicy};
    ///
    /// let body: ChatBody = serde_json::from_value(serde_json::json!({
    ///     "prompt": "hello",
    ///     "provider": "none"
    /// })).unwrap();
    /// let err = GenerationRequest::chat(body, &RequestPolicy::default()).unwrap_err();
    /// assert!(err.to_string().contains("Pick a provider"));
    /// ```
    pub fn chat(body: ChatBody, policy: &RequestPolicy) -> ReelforgeResult<Self> {
        let prompt = body
            .prompt
            .ok_or_else(|| ValidationError::new("Missing prompt"))?;
        let provider = Provider::parse(body.backend.provider.as_deref())?;
        if provider == Provider::None {
            Err(ValidationError::new(
                "Provider is set to template only. Pick a provider to chat.",
            ))?
        }
        Self::build(Task::Chat { prompt }, provider, body.backend, policy)
    }

    /// Validate a generate body. Provider `none` is valid and means "template only".
    pub fn generate(body: GenerateBody, policy: &RequestPolicy) -> ReelforgeResult<Self> {
        let story = body
            .story
            .ok_or_else(|| ValidationError::new("Missing story"))?;
        body.fields.check_durations()?;
        let provider = Provider::parse(body.backend.provider.as_deref())?;
        let task = Task::Generate {
            story,
            fields: body.fields,
        };
        Self::build(task, provider, body.backend, policy)
    }

    fn build(
        task: Task,
        provider: Provider,
        backend: BackendSelection,
        policy: &RequestPolicy,
    ) -> ReelforgeResult<Self> {
        if provider == Provider::Puter {
            Err(ValidationError::new(
                "Puter runs in the browser. The server cannot fulfill provider=puter.",
            ))?
        }
        if !backend.images.is_empty() && !provider.accepts_attachments() {
            Err(ValidationError::new(
                "Images are only supported with Codex CLI.",
            ))?
        }
        if provider == Provider::None {
            return Ok(Self {
                task,
                provider,
                command: None,
                endpoint: EndpointSettings::default(),
                attachments: Vec::new(),
            });
        }

        policy.check_family(provider.family())?;

        let command = match provider {
            Provider::Command => Some(command_settings(&backend)?),
            _ => None,
        };
        let endpoint = backend.settings.endpoint(provider);
        check_endpoint(provider, &endpoint)?;
        let attachments = decode_attachments(&backend.images, policy.max_attachment_bytes)?;

        Ok(Self {
            task,
            provider,
            command,
            endpoint,
            attachments,
        })
    }

    /// Prompt text for chat, story for generate.
    pub fn text(&self) -> &str {
        match &self.task {
            Task::Chat { prompt } => prompt,
            Task::Generate { story, .. } => story,
        }
    }
}

fn command_settings(backend: &BackendSelection) -> ReelforgeResult<CommandSettings> {
    let name = backend
        .command
        .as_deref()
        .ok_or_else(|| ValidationError::new("Missing command for provider=command"))?;
    if !backend.args.is_empty() {
        Err(ValidationError::new("Args are disabled for security."))?
    }
    let preset = CommandPreset::from_command(name);
    if !backend.images.is_empty() && !preset.accepts_images() {
        Err(ValidationError::new(
            "Images are only supported with Codex CLI.",
        ))?
    }
    let model = match preset {
        CommandPreset::Codex => backend.codex_model.clone(),
        CommandPreset::Gemini => backend.gemini_model.clone(),
        CommandPreset::Agent => backend.agent_model.clone(),
        CommandPreset::Custom(_) => None,
    };
    let session = CodexSession::parse(backend.codex_session.as_deref());
    Ok(CommandSettings::new(preset, model, session))
}

fn check_endpoint(provider: Provider, endpoint: &EndpointSettings) -> ReelforgeResult<()> {
    let needs_base_url = matches!(provider, Provider::OpenaiCompatible | Provider::ImageGen);
    let needs_model = matches!(
        provider,
        Provider::Ollama | Provider::OpenaiCompatible | Provider::ImageGen
    );
    if needs_base_url && endpoint.base_url.is_none() {
        Err(ValidationError::new(format!(
            "Missing base_url for provider={}",
            provider
        )))?
    }
    if needs_model && endpoint.model.is_none() {
        Err(ValidationError::new(format!(
            "Missing model for provider={}",
            provider
        )))?
    }
    Ok(())
}

/// Decode every attachment, stopping as soon as the running total passes the cap.
fn decode_attachments(
    payloads: &[AttachmentPayload],
    max_bytes: usize,
) -> ReelforgeResult<Vec<MediaAttachment>> {
    let mut total = 0usize;
    let mut decoded = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let attachment = payload.decode()?;
        total += attachment.len();
        if total > max_bytes {
            Err(ValidationError::new(format!(
                "Total image size exceeds {}MB.",
                max_bytes / (1024 * 1024)
            )))?
        }
        decoded.push(attachment);
    }
    Ok(decoded)
}

/// Image generation target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenConfig {
    /// `gpt4free` routes to the gateway; anything else needs `base_url`
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub provider: Option<String>,
    #[serde(flatten)]
    #[allow(missing_docs)]
    pub endpoint: EndpointSettings,
}

/// `POST /api/generate-image` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageGenBody {
    #[serde(default, deserialize_with = "crate::lenient::text")]
    #[allow(missing_docs)]
    pub prompt: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub config: ImageGenConfig,
}

impl ImageGenBody {
    /// Validate; returns the prompt, whether the gateway is targeted, and the endpoint.
    pub fn validate(self) -> ReelforgeResult<(String, bool, EndpointSettings)> {
        let prompt = self
            .prompt
            .ok_or_else(|| ValidationError::new("Missing prompt"))?;
        let via_gateway = self.config.provider.as_deref() == Some("gpt4free");
        if !via_gateway && self.config.endpoint.base_url.is_none() {
            Err(ValidationError::new("Missing base_url for image generation"))?
        }
        if self.config.endpoint.model.is_none() {
            Err(ValidationError::new("Missing model for image generation"))?
        }
        Ok((prompt, via_gateway, self.config.endpoint))
    }
}
