use reelforge_core::{
    ChatBody, GenerateBody, GenerationRequest, Provider, RequestPolicy, Task,
};
use reelforge_error::ReelforgeErrorKind;
use serde_json::json;

fn open_policy() -> RequestPolicy {
    RequestPolicy {
        command_llm: true,
        http_llm: true,
        ..Default::default()
    }
}

fn chat(value: serde_json::Value, policy: &RequestPolicy) -> reelforge_error::ReelforgeResult<GenerationRequest> {
    let body: ChatBody = serde_json::from_value(value).expect("chat body");
    GenerationRequest::chat(body, policy)
}

fn generate(value: serde_json::Value, policy: &RequestPolicy) -> reelforge_error::ReelforgeResult<GenerationRequest> {
    let body: GenerateBody = serde_json::from_value(value).expect("generate body");
    GenerationRequest::generate(body, policy)
}

#[test]
fn test_blank_prompt_is_missing() {
    let err = chat(json!({"prompt": "   ", "provider": "command"}), &open_policy()).unwrap_err();
    assert_eq!(err.to_string(), "Missing prompt");
}

#[test]
fn test_unknown_provider_is_named() {
    let err = chat(json!({"prompt": "hi", "provider": "bard"}), &open_policy()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown provider: bard");
}

#[test]
fn test_command_disabled_is_feature_error_even_without_command() {
    let err = chat(json!({"prompt": "hi", "provider": "command"}), &RequestPolicy::default())
        .unwrap_err();
    assert!(matches!(err.kind(), ReelforgeErrorKind::FeatureDisabled(_)));
    assert!(err.to_string().contains("ENABLE_COMMAND_LLM=1"));
}

#[test]
fn test_http_disabled_gates_gpt4free() {
    let err = chat(json!({"prompt": "hi", "provider": "gpt4free"}), &RequestPolicy::default())
        .unwrap_err();
    assert!(err.to_string().contains("ENABLE_HTTP_LLM=1"));
}

#[test]
fn test_caller_args_are_rejected() {
    let err = chat(
        json!({"prompt": "hi", "provider": "command", "command": "codex", "args": ["--yolo"]}),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Args are disabled for security.");
}

#[test]
fn test_images_need_codex() {
    let image = json!({"name": "a.png", "type": "image/png", "data": "AAAA"});
    let err = chat(
        json!({"prompt": "hi", "provider": "ollama", "images": [image.clone()]}),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Images are only supported with Codex CLI.");

    let err = chat(
        json!({"prompt": "hi", "provider": "command", "command": "gemini", "images": [image]}),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Images are only supported with Codex CLI.");
}

#[test]
fn test_oversized_attachments_are_rejected() {
    use base64::Engine as _;
    let chunk = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 6 * 1024 * 1024]);
    let err = chat(
        json!({
            "prompt": "hi",
            "provider": "command",
            "command": "codex",
            "images": [
                {"name": "a.png", "type": "image/png", "data": chunk.clone()},
                {"name": "b.png", "type": "image/png", "data": chunk}
            ]
        }),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Total image size exceeds 10MB.");
}

#[test]
fn test_codex_request_keeps_decoded_attachments() {
    let request = chat(
        json!({
            "prompt": "describe",
            "provider": "command",
            "command": "codex",
            "codex_model": "o4-mini",
            "images": [{"name": "a.png", "type": "image/png", "data": "data:image/png;base64,AAEC"}, "junk"]
        }),
        &open_policy(),
    )
    .unwrap();
    assert_eq!(*request.provider(), Provider::Command);
    assert_eq!(request.attachments().len(), 1);
    let settings = request.command().as_ref().unwrap();
    assert_eq!(settings.model().as_deref(), Some("o4-mini"));
}

#[test]
fn test_nested_settings_win_over_top_level() {
    let request = chat(
        json!({
            "prompt": "hi",
            "provider": "openai_compatible",
            "model": "fallback",
            "openai_compatible": {"base_url": "http://localhost:8000", "model": "qwen"}
        }),
        &open_policy(),
    )
    .unwrap();
    assert_eq!(request.endpoint().model.as_deref(), Some("qwen"));
    assert_eq!(request.endpoint().base_url.as_deref(), Some("http://localhost:8000"));
}

#[test]
fn test_openai_compatible_needs_base_url() {
    let err = chat(
        json!({"prompt": "hi", "provider": "openai_compatible", "openai_compatible": {"model": "m"}}),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Missing base_url for provider=openai_compatible");
}

#[test]
fn test_generate_template_only_skips_gates() {
    let request = generate(
        json!({"story": "a cat", "duration_seconds": 12, "part_length_seconds": "4"}),
        &RequestPolicy::default(),
    )
    .unwrap();
    assert_eq!(*request.provider(), Provider::None);
    match request.task() {
        Task::Generate { story, fields } => {
            assert_eq!(story, "a cat");
            assert_eq!(fields.duration_seconds.as_deref(), Some("12"));
        }
        other => panic!("unexpected task {:?}", other),
    }
}

#[test]
fn test_generate_rejects_long_parts() {
    let err = generate(
        json!({"story": "a cat", "duration_seconds": "8", "part_length_seconds": "9"}),
        &open_policy(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Part length must be less than total duration.");
}

#[test]
fn test_puter_is_browser_only() {
    let err = chat(json!({"prompt": "hi", "provider": "puter"}), &open_policy()).unwrap_err();
    assert!(matches!(err.kind(), ReelforgeErrorKind::Validation(_)));
}
