//! Outbound HTTP backends.

use futures::StreamExt;
use reelforge_error::{HttpError, HttpErrorKind, ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// System prompt sent with every chat completion.
const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Sampling temperature sent with every chat completion.
const TEMPERATURE: f32 = 0.8;

/// Largest image the proxy relays.
pub const MAX_PROXY_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

/// An OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChatTarget<'a> {
    /// API root without the `/v1` suffix
    pub base_url: &'a str,
    /// Model name
    pub model: &'a str,
    /// Sent as a bearer token when present
    pub api_key: Option<&'a str>,
}

/// An image fetched by the proxy.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Upstream `content-type`
    pub content_type: String,
    /// Body bytes
    pub bytes: Vec<u8>,
}

/// Client for the HTTP-compatible inference backends.
#[derive(Debug, Clone)]
pub struct HttpBackends {
    client: reqwest::Client,
}

impl HttpBackends {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> ReelforgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HttpError::new(HttpErrorKind::Request {
                    url: String::new(),
                    reason: e.to_string(),
                })
            })?;
        Ok(Self { client })
    }

    /// `POST <base>/api/generate` with streaming off; returns `response`.
    #[instrument(skip(self, prompt), fields(model = %model, prompt_len = prompt.len()))]
    pub async fn ollama(&self, base_url: &str, model: &str, prompt: &str) -> ReelforgeResult<String> {
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let body = OllamaRequest {
            model,
            prompt,
            stream: false,
        };
        let text = self.post_json(&url, &body, None).await?;
        let parsed: OllamaResponse = parse(&url, &text)?;
        let response = parsed
            .response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| malformed(&url, "Ollama response missing response text"))?;
        debug!(chars = response.len(), "Ollama generation complete");
        Ok(response)
    }

    /// `POST <base>/v1/chat/completions`; returns `choices[0].message.content`.
    #[instrument(skip(self, target, prompt), fields(model = %target.model, prompt_len = prompt.len()))]
    pub async fn chat_completion(&self, target: ChatTarget<'_>, prompt: &str) -> ReelforgeResult<String> {
        let url = completions_url(target.base_url);
        let text = self
            .post_json(&url, &chat_request(target.model, prompt), target.api_key)
            .await?;
        let parsed: ChatCompletionResponse = parse(&url, &text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                malformed(
                    &url,
                    "OpenAI-compatible response missing choices[0].message.content",
                )
            })?;
        debug!(chars = content.len(), "Chat completion successful");
        Ok(content)
    }

    /// Ask an OpenAI-compatible endpoint for an image and return its JSON as is.
    #[instrument(skip(self, target, prompt), fields(model = %target.model))]
    pub async fn image_generation(&self, target: ChatTarget<'_>, prompt: &str) -> ReelforgeResult<Value> {
        let url = completions_url(target.base_url);
        let text = self
            .post_json(&url, &chat_request(target.model, prompt), target.api_key)
            .await?;
        parse(&url, &text)
    }

    /// Fetch a remote image on behalf of the browser.
    ///
    /// Only `http` and `https` URLs are followed. The fetch fails on a transport
    /// error, a non-2xx status, a non-image content type, or a body larger than
    /// [`MAX_PROXY_IMAGE_BYTES`], each with its own message.
    #[instrument(skip(self))]
    pub async fn fetch_image(&self, raw_url: &str) -> ReelforgeResult<FetchedImage> {
        let url = url::Url::parse(raw_url)
            .map_err(|e| ValidationError::new(format!("Invalid url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            Err(ValidationError::new("Only http and https URLs can be proxied."))?
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_failed(raw_url, &e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::status(status.as_u16(), raw_url, &body).into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(malformed(
                raw_url,
                format!("expected an image but got content-type '{}'", content_type),
            )
            .into());
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_PROXY_IMAGE_BYTES as u64)
        {
            return Err(too_large(raw_url).into());
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| request_failed(raw_url, &e))?;
            if bytes.len() + chunk.len() > MAX_PROXY_IMAGE_BYTES {
                return Err(too_large(raw_url).into());
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(bytes = bytes.len(), %content_type, "Proxied image");
        Ok(FetchedImage {
            content_type,
            bytes,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        api_key: Option<&str>,
    ) -> ReelforgeResult<String> {
        debug!(%url, "Sending backend request");
        let mut request = self.client.post(url).json(body);
        if let Some(api_key) = api_key.filter(|k| !k.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| request_failed(url, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| request_failed(url, &e))?;
        if !status.is_success() {
            tracing::error!(%url, status = status.as_u16(), "Backend returned error");
            return Err(HttpError::status(status.as_u16(), url, &text).into());
        }
        Ok(text)
    }
}

fn chat_request<'a>(model: &'a str, prompt: &'a str) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: TEMPERATURE,
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

fn parse<T: serde::de::DeserializeOwned>(url: &str, text: &str) -> ReelforgeResult<T> {
    serde_json::from_str(text)
        .map_err(|e| malformed(url, format!("invalid JSON: {}", e)).into())
}

fn request_failed(url: &str, e: &reqwest::Error) -> HttpError {
    HttpError::new(HttpErrorKind::Request {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[track_caller]
fn malformed(url: &str, reason: impl Into<String>) -> HttpError {
    HttpError::new(HttpErrorKind::MalformedResponse {
        url: url.to_string(),
        reason: reason.into(),
    })
}

fn too_large(url: &str) -> HttpError {
    malformed(
        url,
        format!("image exceeds {}MB", MAX_PROXY_IMAGE_BYTES / (1024 * 1024)),
    )
}
