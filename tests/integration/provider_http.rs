//! Provider clients against a local HTTP server.

use crate::integration::test_utils::MockHttpServer;
use lessonforge::config::{GenerationSettings, ModelTiers};
use lessonforge::error::ApiError;
use lessonforge::generator::CodeGenerator;
use lessonforge::prompt::PromptSpec;
use lessonforge::provider::{
    ChatMessage, CompletionOptions, GeminiClient, ModelProviderClient, ProviderConfig,
    ProviderType,
};
use lessonforge::{GenerationRequest, QualityTier, Subject};
use std::sync::Arc;
use std::time::Duration;

const GEMINI_OK: &str = r#"{
  "candidates": [{
    "content": {"role": "model", "parts": [{"text": "```python\nfrom manim import *\n"}, {"text": "class SceneTopic(Scene): pass\n```"}]},
    "finishReason": "STOP"
  }],
  "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 30, "totalTokenCount": 42},
  "modelVersion": "gemini-2.0-flash-001"
}"#;

const GEMINI_QUOTA: &str =
    r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;

#[tokio::test]
async fn gemini_success_is_parsed() {
    let server = MockHttpServer::start(vec![(200, GEMINI_OK.to_string())]);
    let client = GeminiClient::new(
        "gemini-2.0-flash".to_string(),
        "test-key".to_string(),
        Some(server.base_url.clone()),
        Duration::from_secs(5),
    )
    .unwrap();

    let response = client
        .complete(
            vec![ChatMessage::system("be brief"), ChatMessage::user("circles")],
            CompletionOptions::default(),
        )
        .await
        .unwrap();

    assert!(response.content.contains("class SceneTopic(Scene)"));
    assert_eq!(response.model, "gemini-2.0-flash-001");
    assert_eq!(response.usage.total_tokens, 42);

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/models/gemini-2.0-flash:generateContent");
    assert_eq!(request.header("x-goog-api-key"), Some("test-key"));
    let body = request.json();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "circles");
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
}

#[tokio::test]
async fn gemini_429_is_a_quota_signal() {
    let server = MockHttpServer::start(vec![(429, GEMINI_QUOTA.to_string())]);
    let client = GeminiClient::new(
        "gemini-2.0-flash".to_string(),
        "k".to_string(),
        Some(server.base_url.clone()),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = client
        .complete(vec![ChatMessage::user("x")], CompletionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ProviderRateLimit(_)));
    assert!(err.is_quota_exceeded());
    server.finish();
}

#[tokio::test]
async fn generator_falls_back_after_quota_response() {
    let server = MockHttpServer::start(vec![
        (429, GEMINI_QUOTA.to_string()),
        (200, GEMINI_OK.to_string()),
    ]);
    let provider = ProviderConfig {
        provider_type: ProviderType::Gemini,
        api_key: Some("k".to_string()),
        endpoint: Some(server.base_url.clone()),
        request_timeout_secs: 5,
    };
    let models = ModelTiers {
        medium: "primary-model".to_string(),
        fallback: "backup-model".to_string(),
        ..ModelTiers::default()
    };
    let settings = GenerationSettings {
        quota_backoff_ms: 0,
        ..GenerationSettings::default()
    };
    let generator = CodeGenerator::new(Arc::new(provider), models, settings);

    let request =
        GenerationRequest::new("Circles", Subject::Mathematics, QualityTier::Medium, None, false)
            .unwrap();
    let source = generator
        .produce(&PromptSpec::lesson(&request, false))
        .await
        .unwrap();
    assert!(!source.text().contains("```"));
    assert!(source.text().starts_with("from manim import *"));

    let paths: Vec<_> = server.finish().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/models/primary-model:generateContent",
            "/models/backup-model:generateContent",
        ]
    );
}
