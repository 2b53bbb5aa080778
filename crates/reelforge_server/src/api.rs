//! HTTP routes.

use crate::{AppState, ServerConfig};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reelforge_core::{
    AttachmentPayload, ChatBody, GenerateBody, ImageGenBody, QueueItem, QueueRequest,
};
use reelforge_error::{ReelforgeError, ReelforgeErrorKind, ValidationError};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::services::ServeDir;
use tracing::{error, warn};

/// Build the application router.
///
/// Unmatched paths fall through to the static UI in `public_dir`.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/generate", post(generate))
        .route(
            "/api/merge-videos",
            post(merge_videos).layer(DefaultBodyLimit::max(*config.max_merge_body_bytes())),
        )
        .route("/api/generate-image", post(generate_image))
        .route("/api/gpt4free/connect", post(connect_gateway))
        .route("/api/cli/diagnostics", get(cli_diagnostics))
        .route("/api/extension/queue", post(enqueue))
        .route("/api/extension/queue/next", get(next_queued))
        .route("/api/image-proxy", get(image_proxy))
        .route("/api/prompts", get(list_prompts))
        .route("/api/prompts/get", post(get_prompt))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/call", post(call_tool))
        .route("/api/resources", get(list_resources))
        .route("/api/resources/read", get(read_resource))
        .layer(DefaultBodyLimit::max(*config.max_body_bytes()))
        .fallback_service(ServeDir::new(config.public_dir()))
        .with_state(state)
}

/// A failed request, rendered as `{ ok: false, error }`.
#[derive(Debug)]
pub enum ApiError {
    /// Any orchestrator error
    Reelforge(ReelforgeError),
    /// The body could not be extracted
    Rejected {
        /// Status chosen by the extractor
        status: StatusCode,
        /// Extractor message
        message: String,
    },
}

impl ApiError {
    fn invalid(message: &str) -> Self {
        Self::Reelforge(ValidationError::new(message).into())
    }
}

impl From<ReelforgeError> for ApiError {
    fn from(err: ReelforgeError) -> Self {
        Self::Reelforge(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Status code for an error kind.
pub fn status_for(kind: &ReelforgeErrorKind) -> StatusCode {
    match kind {
        ReelforgeErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
        ReelforgeErrorKind::FeatureDisabled(_) => StatusCode::FORBIDDEN,
        ReelforgeErrorKind::Subprocess(_)
        | ReelforgeErrorKind::Bootstrap(_)
        | ReelforgeErrorKind::Http(_)
        | ReelforgeErrorKind::Catalog(_) => StatusCode::BAD_GATEWAY,
        ReelforgeErrorKind::Storage(_)
        | ReelforgeErrorKind::Merge(_)
        | ReelforgeErrorKind::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Reelforge(err) => {
                let status = status_for(err.kind());
                let (file, line) = err.location();
                if status.is_server_error() {
                    error!(%status, source_file = file, source_line = line, error = %err, "Request failed");
                } else {
                    warn!(%status, source_file = file, source_line = line, error = %err, "Request rejected");
                }
                (status, err.to_string())
            }
            ApiError::Rejected { status, message } => {
                warn!(%status, %message, "Request body rejected");
                (status, message)
            }
        };
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn chat(State(state): State<AppState>, body: Result<Json<ChatBody>, JsonRejection>) -> ApiResult {
    let Json(body) = body?;
    let generated = state.dispatcher().chat(body).await?;
    Ok(Json(json!({ "ok": true, "mode": generated.mode, "text": generated.text })))
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let generated = state.dispatcher().generate(body).await?;
    Ok(Json(json!({ "ok": true, "mode": generated.mode, "text": generated.text })))
}

#[derive(Debug, Default, Deserialize)]
struct MergeBody {
    #[serde(default)]
    files: Vec<AttachmentPayload>,
}

async fn merge_videos(
    State(state): State<AppState>,
    body: Result<Json<MergeBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let merged = state.dispatcher().merge_videos(&body.files).await?;
    Ok(Json(json!({
        "ok": true,
        "file": {
            "name": merged.name(),
            "type": merged.mime_type(),
            "data": STANDARD.encode(merged.bytes()),
        }
    })))
}

async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<ImageGenBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    Ok(Json(state.dispatcher().generate_image(body).await?))
}

async fn connect_gateway(State(state): State<AppState>) -> ApiResult {
    let status = state.dispatcher().connect_gateway().await?;
    Ok(Json(json!({ "ok": true, "api_url": status.api_url, "phase": status.phase })))
}

async fn cli_diagnostics(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "commands": state.dispatcher().cli_diagnostics() }))
}

async fn enqueue(
    State(state): State<AppState>,
    body: Result<Json<QueueRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let item = QueueItem::from_request(body)?;
    let replaced = state.queue().put(item.clone()).is_some();
    Ok(Json(json!({ "ok": true, "item": item, "replaced": replaced })))
}

async fn next_queued(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "item": state.queue().take_next() }))
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: Option<String>,
}

async fn image_proxy(State(state): State<AppState>, Query(query): Query<UrlQuery>) -> Result<Response, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("Missing url query param"))?;
    let image = state.dispatcher().proxy_image(url.trim()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
struct NamedCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Map<String, Value>,
}

impl NamedCall {
    fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

async fn list_prompts(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.dispatcher().catalog().list_prompts().await.map_err(ReelforgeError::from)?))
}

async fn get_prompt(
    State(state): State<AppState>,
    body: Result<Json<NamedCall>, JsonRejection>,
) -> ApiResult {
    let Json(call) = body?;
    let name = call.name().ok_or_else(|| ApiError::invalid("Missing prompt name"))?;
    let result = state
        .dispatcher()
        .catalog()
        .get_prompt(name, call.arguments.clone())
        .await
        .map_err(ReelforgeError::from)?;
    Ok(Json(result))
}

async fn list_tools(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.dispatcher().catalog().list_tools().await.map_err(ReelforgeError::from)?))
}

async fn call_tool(
    State(state): State<AppState>,
    body: Result<Json<NamedCall>, JsonRejection>,
) -> ApiResult {
    let Json(call) = body?;
    let name = call.name().ok_or_else(|| ApiError::invalid("Missing tool name"))?;
    let result = state
        .dispatcher()
        .catalog()
        .call_tool(name, call.arguments.clone())
        .await
        .map_err(ReelforgeError::from)?;
    Ok(Json(result))
}

async fn list_resources(State(state): State<AppState>) -> ApiResult {
    Ok(Json(state.dispatcher().catalog().list_resources().await.map_err(ReelforgeError::from)?))
}

#[derive(Debug, Deserialize)]
struct UriQuery {
    uri: Option<String>,
}

async fn read_resource(State(state): State<AppState>, Query(query): Query<UriQuery>) -> ApiResult {
    let uri = query
        .uri
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::invalid("Missing uri query param"))?;
    let result = state
        .dispatcher()
        .catalog()
        .read_resource(&uri)
        .await
        .map_err(ReelforgeError::from)?;
    Ok(Json(result))
}
