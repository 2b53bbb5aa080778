//! Router tests through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use reelforge_bootstrap::{BootstrapConfig, Bootstrapper};
use reelforge_catalog::{CatalogBridge, CatalogChannel, CatalogConnector};
use reelforge_core::RequestPolicy;
use reelforge_error::{CatalogError, HttpError, SubprocessError};
use reelforge_process::{CommandRunner, ProcessRunner, SubprocessInvocation};
use reelforge_server::{
    AppState, Dispatcher, HttpBackends, MAX_PROXY_IMAGE_BYTES, ServerConfig, router,
};
use reelforge_storage::{MergePipeline, TransientFileStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tower::ServiceExt;

/// Records invocations instead of spawning anything.
#[derive(Default)]
struct SpyRunner {
    calls: Mutex<Vec<SubprocessInvocation>>,
    images_present: Mutex<Vec<bool>>,
}

impl SpyRunner {
    fn calls(&self) -> Vec<SubprocessInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for SpyRunner {
    async fn run(&self, invocation: &SubprocessInvocation) -> Result<String, SubprocessError> {
        for pair in invocation.args().windows(2) {
            if pair[0] == "-i" {
                self.images_present
                    .lock()
                    .unwrap()
                    .push(Path::new(&pair[1]).is_file());
            }
        }
        self.calls.lock().unwrap().push(invocation.clone());
        Ok("spy says hi".to_string())
    }
}

/// Renders `structured_video_prompt` as `rendered: <story>`.
struct FakeCatalog;

#[async_trait]
impl CatalogConnector for FakeCatalog {
    async fn connect(&self) -> Result<CatalogChannel, CatalogError> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let message: Value = serde_json::from_str(&line).unwrap();
                let Some(id) = message.get("id").cloned() else {
                    continue;
                };
                let result = match message["method"].as_str() {
                    Some("prompts/get") => json!({
                        "messages": [{
                            "role": "user",
                            "content": {
                                "type": "text",
                                "text": format!("rendered: {}", message["params"]["arguments"]["story"].as_str().unwrap_or_default())
                            }
                        }]
                    }),
                    Some("tools/list") => json!({ "tools": [{ "name": "storyboard" }] }),
                    _ => json!({}),
                };
                let reply = json!({ "jsonrpc": "2.0", "id": id, "result": result });
                if write
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        let (read, write) = tokio::io::split(client);
        Ok(CatalogChannel::new(BufReader::new(read), write))
    }
}

struct Harness {
    app: Router,
    spy: Arc<SpyRunner>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(policy: RequestPolicy) -> Self {
        Self::with(policy, "ffmpeg", HashMap::new())
    }

    fn with(policy: RequestPolicy, ffmpeg: &str, overrides: HashMap<String, String>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let spy = Arc::new(SpyRunner::default());
        let runner: Arc<dyn CommandRunner> = spy.clone();

        let gateway = Bootstrapper::new(
            BootstrapConfig::builder()
                .api_url("http://127.0.0.1:9")
                .bin_root(dir.path().join("bin"))
                .build()
                .unwrap(),
        )
        .unwrap();
        let merger = MergePipeline::new(
            ffmpeg,
            dir.path().join("merge"),
            Arc::new(ProcessRunner),
            Duration::from_secs(10),
        );

        let dispatcher = Dispatcher::builder()
            .policy(policy)
            .runner(runner)
            .uploads(TransientFileStore::new(dir.path().join("uploads")))
            .merger(merger)
            .catalog(Arc::new(CatalogBridge::new(Arc::new(FakeCatalog))))
            .backends(HttpBackends::new(Duration::from_secs(5)).unwrap())
            .gateway(gateway)
            .command_overrides(overrides)
            .build()
            .unwrap();

        let config = ServerConfig::from_env_map([(
            "PUBLIC_DIR",
            dir.path().join("public").display().to_string(),
        )])
        .unwrap();
        let app = router(AppState::new(dispatcher), &config);
        Self { app, spy, dir }
    }

    fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// Requests seen by the fake upstream: bearer header and JSON body.
#[derive(Default)]
struct Upstream {
    seen: Mutex<Vec<(Option<String>, Value)>>,
}

impl Upstream {
    fn record(&self, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push((auth, body));
    }

    fn seen(&self) -> Vec<(Option<String>, Value)> {
        self.seen.lock().unwrap().clone()
    }
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake pixels";

async fn ollama_generate(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    upstream.record(&headers, body);
    Json(json!({ "model": "llama3", "response": "  hello from ollama \n", "done": true }))
}

async fn chat_completions(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    upstream.record(&headers, body);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": " hello from the compatible api " } }]
    }))
}

async fn overloaded() -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, "x".repeat(10_000))
}

async fn content_missing() -> Json<Value> {
    Json(json!({ "choices": [{ "message": { "role": "assistant" } }] }))
}

async fn no_choices() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

async fn not_json() -> &'static str {
    "<html>gateway error</html>"
}

async fn png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG)
}

async fn gone() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "no such image")
}

async fn web_page() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
}

async fn huge_declared() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], vec![0u8; MAX_PROXY_IMAGE_BYTES + 1])
}

/// Over the cap without a content-length, one megabyte at a time.
async fn huge_streamed() -> impl IntoResponse {
    let chunks = futures::stream::iter(
        (0..21).map(|_| Ok::<_, std::io::Error>(vec![0u8; 1024 * 1024])),
    );
    ([(header::CONTENT_TYPE, "image/png")], Body::from_stream(chunks))
}

/// Serve a fake inference and image host on an ephemeral port.
async fn fake_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/api/generate", post(ollama_generate))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/overloaded/v1/chat/completions", post(overloaded))
        .route("/no-content/v1/chat/completions", post(content_missing))
        .route("/no-choices/v1/chat/completions", post(no_choices))
        .route("/html/v1/chat/completions", post(not_json))
        .route("/img/ok.png", get(png))
        .route("/img/gone.png", get(gone))
        .route("/img/page", get(web_page))
        .route("/img/huge.png", get(huge_declared))
        .route("/img/streamed.png", get(huge_streamed))
        .with_state(Arc::clone(&upstream));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), upstream)
}

fn openai_chat(base_url: &str) -> Value {
    json!({
        "prompt": "hello",
        "provider": "openai_compatible",
        "openai_compatible": { "base_url": base_url, "model": "m", "api_key": "sk-test" }
    })
}

fn enabled() -> RequestPolicy {
    RequestPolicy {
        command_llm: true,
        http_llm: true,
        ..RequestPolicy::default()
    }
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_chat_with_template_provider_asks_for_a_provider() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post("/api/chat", json!({ "prompt": "hello", "provider": "none" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("Pick a provider"));
}

#[tokio::test]
async fn test_disabled_command_provider_spawns_nothing() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({ "prompt": "hello", "provider": "command", "command": "gemini" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("ENABLE_COMMAND_LLM"));
    assert!(harness.spy.calls().is_empty());
}

#[tokio::test]
async fn test_disabled_http_provider_fails_closed() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "hello",
                "provider": "openai_compatible",
                "openai_compatible": { "base_url": "http://127.0.0.1:9", "model": "m" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("ENABLE_HTTP_LLM"));
}

#[tokio::test]
async fn test_gemini_chat_runs_preset() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "hello",
                "provider": "command",
                "command": "gemini",
                "gemini_model": "flash"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "mode": "chat", "text": "spy says hi" }));

    let calls = harness.spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command(), "gemini");
    assert_eq!(calls[0].args(), &["--model".to_string(), "flash".to_string()]);
    assert_eq!(calls[0].input().as_deref(), Some(&b"hello"[..]));
}

#[tokio::test]
async fn test_command_override_replaces_path_lookup() {
    let mut overrides = HashMap::new();
    overrides.insert("agent".to_string(), "/opt/cursor/agent".to_string());
    let harness = Harness::with(enabled(), "ffmpeg", overrides);
    let (status, _) = harness
        .post(
            "/api/chat",
            json!({ "prompt": "hello", "provider": "command", "command": "agent" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let calls = harness.spy.calls();
    assert_eq!(calls[0].command(), "/opt/cursor/agent");
    assert_eq!(calls[0].args(), &["-p".to_string(), "hello".to_string()]);
    assert!(calls[0].input().is_none());
}

#[tokio::test]
async fn test_codex_images_exist_during_run_and_are_removed_after() {
    let harness = Harness::new(enabled());
    let (status, _) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "describe",
                "provider": "command",
                "command": "codex",
                "images": [
                    { "name": "a.png", "type": "image/png", "data": STANDARD.encode(b"png-a") },
                    { "name": "b.jpg", "type": "image/jpeg", "data": format!("data:image/jpeg;base64,{}", STANDARD.encode(b"jpg-b")) }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(*harness.spy.images_present.lock().unwrap(), [true, true]);
    assert!(dir_is_empty(&harness.uploads()));
}

#[tokio::test]
async fn test_images_rejected_for_non_codex_commands() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "describe",
                "provider": "command",
                "command": "gemini",
                "images": [{ "name": "a.png", "type": "image/png", "data": STANDARD.encode(b"png") }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Images are only supported with Codex CLI.");
    assert!(harness.spy.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_attachments_rejected_before_any_write() {
    let harness = Harness::new(enabled());
    let chunk = STANDARD.encode(vec![7u8; 6 * 1024 * 1024]);
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "describe",
                "provider": "command",
                "command": "codex",
                "images": [
                    { "name": "a.png", "type": "image/png", "data": chunk },
                    { "name": "b.png", "type": "image/png", "data": chunk }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Total image size exceeds 10MB.");
    assert!(dir_is_empty(&harness.uploads()));
    assert!(harness.spy.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_provider() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post("/api/chat", json!({ "prompt": "hello", "provider": "bard" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown provider: bard");
}

#[tokio::test]
async fn test_generate_template_only() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness
        .post(
            "/api/generate",
            json!({ "story": "a cat in the rain", "provider": "none", "camera": "dolly in" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "template");
    assert_eq!(body["text"], "rendered: a cat in the rain");
}

#[tokio::test]
async fn test_generate_sends_writer_instruction_to_agent() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post(
            "/api/generate",
            json!({ "story": "a fox", "provider": "command", "command": "gemini" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "generated");

    let calls = harness.spy.calls();
    let stdin = String::from_utf8(calls[0].input().clone().unwrap()).unwrap();
    assert!(stdin.starts_with("You are a prompt writer."));
    assert!(stdin.contains("rendered: a fox"));
}

#[tokio::test]
async fn test_generate_rejects_part_longer_than_total() {
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post(
            "/api/generate",
            json!({
                "story": "a fox",
                "provider": "none",
                "duration_seconds": "8",
                "part_length_seconds": 10
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Part length must be less than total duration.");
}

#[tokio::test]
async fn test_extension_queue_keeps_latest_and_hands_it_out_once() {
    let harness = Harness::new(RequestPolicy::default());
    harness
        .post("/api/extension/queue", json!({ "prompt": "x" }))
        .await;
    let (_, second) = harness
        .post("/api/extension/queue", json!({ "prompt": "y", "count": 3 }))
        .await;
    assert_eq!(second["replaced"], true);

    let (status, next) = harness.get("/api/extension/queue/next").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["item"]["prompt"], "y");
    assert_eq!(next["item"]["count"], 3);

    let (_, empty) = harness.get("/api/extension/queue/next").await;
    assert_eq!(empty["item"], Value::Null);
}

#[tokio::test]
async fn test_catalog_passthrough() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, tools) = harness.get("/api/tools").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tools["tools"][0]["name"], "storyboard");

    let (status, body) = harness.post("/api/tools/call", json!({ "arguments": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing tool name");

    let (status, body) = harness.get("/api/resources/read").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing uri query param");
}

#[tokio::test]
async fn test_image_proxy_rejects_non_http_urls() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness
        .get("/api/image-proxy?url=file%3A%2F%2F%2Fetc%2Fpasswd")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only http and https URLs can be proxied.");

    let (status, body) = harness.get("/api/image-proxy").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing url query param");
}

#[tokio::test]
async fn test_image_generation_is_gated() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, _) = harness
        .post(
            "/api/generate-image",
            json!({ "prompt": "a fox", "config": { "base_url": "http://127.0.0.1:9", "model": "m" } }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cli_diagnostics_reports_each_preset() {
    let mut overrides = HashMap::new();
    overrides.insert("codex".to_string(), "/nonexistent/codex".to_string());
    let harness = Harness::with(RequestPolicy::default(), "ffmpeg", overrides);
    let (status, body) = harness.get("/api/cli/diagnostics").await;
    assert_eq!(status, StatusCode::OK);

    let commands = body["commands"].as_array().unwrap();
    let names: Vec<&str> = commands
        .iter()
        .map(|c| c["command"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["codex", "gemini", "agent"]);
    assert_eq!(commands[0]["ok"], false);
    assert!(commands[0]["error"]
        .as_str()
        .unwrap()
        .contains("/nonexistent/codex"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_merge_videos_end_to_end() {
    use std::os::unix::fs::PermissionsExt;

    let tools = tempfile::tempdir().unwrap();
    let ffmpeg = tools.path().join("ffmpeg");
    std::fs::write(
        &ffmpeg,
        r#"#!/bin/sh
list=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) list="$2"; shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
: > "$out"
sed -e "s/^file '//" -e "s/'$//" "$list" | while IFS= read -r part; do
  cat "$part" >> "$out"
done
"#,
    )
    .unwrap();
    std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

    let harness = Harness::with(
        RequestPolicy::default(),
        ffmpeg.to_str().unwrap(),
        HashMap::new(),
    );
    let (status, body) = harness
        .post(
            "/api/merge-videos",
            json!({
                "files": [
                    { "name": "a.mp4", "type": "video/mp4", "data": STANDARD.encode(b"first-") },
                    { "name": "b.mp4", "type": "video/mp4", "data": format!("data:video/mp4;base64,{}", STANDARD.encode(b"second")) }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["file"]["name"], "merged.mp4");
    assert_eq!(body["file"]["type"], "video/mp4");
    let data = STANDARD
        .decode(body["file"]["data"].as_str().unwrap())
        .unwrap();
    assert_eq!(data, b"first-second");
    assert!(dir_is_empty(&harness.dir.path().join("merge")));
}

#[tokio::test]
async fn test_merge_without_files() {
    let harness = Harness::new(RequestPolicy::default());
    let (status, body) = harness.post("/api/merge-videos", json!({ "files": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No video files provided.");
}

#[tokio::test]
async fn test_ollama_chat_against_fake_upstream() {
    let (base, upstream) = fake_upstream().await;
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post(
            "/api/chat",
            json!({
                "prompt": "hello",
                "provider": "ollama",
                "ollama": { "base_url": format!("{}/", base), "model": "llama3" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["text"], "hello from ollama");

    let seen = upstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, None);
    assert_eq!(seen[0].1, json!({ "model": "llama3", "prompt": "hello", "stream": false }));
}

#[tokio::test]
async fn test_openai_compatible_chat_against_fake_upstream() {
    let (base, upstream) = fake_upstream().await;
    let harness = Harness::new(enabled());
    let (status, body) = harness.post("/api/chat", openai_chat(&base)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["text"], "hello from the compatible api");

    let seen = upstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("Bearer sk-test"));
    assert_eq!(seen[0].1["model"], "m");
    assert_eq!(seen[0].1["messages"][1], json!({ "role": "user", "content": "hello" }));
}

#[tokio::test]
async fn test_upstream_error_status_echoes_a_bounded_body() {
    let (base, _) = fake_upstream().await;
    let harness = Harness::new(enabled());
    let (status, body) = harness
        .post("/api/chat", openai_chat(&format!("{}/overloaded", base)))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    let (head, echoed) = error.split_once('\n').unwrap();
    assert!(head.starts_with("HTTP 503 from "), "{}", head);
    assert_eq!(echoed, format!("{}…", "x".repeat(HttpError::MAX_BODY_ECHO)));
}

#[tokio::test]
async fn test_unusable_completion_payloads_are_malformed() {
    let (base, _) = fake_upstream().await;
    let harness = Harness::new(enabled());
    for (route, expected) in [
        ("no-content", "missing choices[0].message.content"),
        ("no-choices", "missing choices[0].message.content"),
        ("html", "invalid JSON"),
    ] {
        let (status, body) = harness
            .post("/api/chat", openai_chat(&format!("{}/{}", base, route)))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{}", route);
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Malformed response from "), "{}", error);
        assert!(error.contains(expected), "{}: {}", route, error);
    }
}

#[tokio::test]
async fn test_image_proxy_relays_images() {
    let (base, _) = fake_upstream().await;
    let harness = Harness::new(RequestPolicy::default());
    let request = Request::builder()
        .uri(format!("/api/image-proxy?url={}/img/ok.png", base))
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG);
}

#[tokio::test]
async fn test_image_proxy_upstream_failures() {
    let (base, _) = fake_upstream().await;
    let harness = Harness::new(RequestPolicy::default());
    for (path, expected) in [
        ("img/gone.png", "HTTP 404"),
        ("img/page", "content-type 'text/html'"),
        ("img/huge.png", "image exceeds 20MB"),
        ("img/streamed.png", "image exceeds 20MB"),
    ] {
        let (status, body) = harness
            .get(&format!("/api/image-proxy?url={}/{}", base, path))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{}", path);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains(expected), "{}: {}", path, error);
    }
}
