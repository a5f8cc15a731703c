//! Publishing against a local stand-in for the GitHub contents API.

use crate::integration::test_utils::MockHttpServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lessonforge::config::PublishSettings;
use lessonforge::error::ApiError;
use lessonforge::publish::GitHubPublisher;
use std::fs;
use tempfile::TempDir;

fn settings(api_base: &str, branch: Option<&str>) -> PublishSettings {
    PublishSettings {
        branch: branch.map(str::to_string),
        api_base: api_base.to_string(),
        ..PublishSettings::default()
    }
}

#[tokio::test]
async fn test_publish_uploads_and_removes_local_copy() {
    let temp = TempDir::new().unwrap();
    let video = temp.path().join("lesson.mp4");
    fs::write(&video, b"not really an mp4").unwrap();

    let server = MockHttpServer::start(vec![(
        201,
        r#"{"content": {"download_url": "https://raw.example.test/octo/lessons/main/videos/x_lesson.mp4", "html_url": "https://example.test/blob"}}"#
            .to_string(),
    )]);
    let publisher = GitHubPublisher::new(
        Some("octo/lessons".to_string()),
        Some("secret-token".to_string()),
        &settings(&server.base_url, Some("main")),
    )
    .unwrap();

    let url = publisher.publish(&video).await.unwrap();
    assert_eq!(
        url,
        "https://raw.example.test/octo/lessons/main/videos/x_lesson.mp4"
    );
    assert!(!video.exists());

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "PUT");
    assert!(request.path.starts_with("/repos/octo/lessons/contents/videos/"));
    assert!(request.path.ends_with("_lesson.mp4"));
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));

    let body = request.json();
    assert_eq!(body["branch"], "main");
    assert_eq!(body["message"], "Upload video: lesson.mp4");
    let decoded = STANDARD.decode(body["content"].as_str().unwrap()).unwrap();
    assert_eq!(decoded, b"not really an mp4");
}

#[tokio::test]
async fn test_rejected_upload_keeps_local_copy() {
    let temp = TempDir::new().unwrap();
    let video = temp.path().join("lesson.mp4");
    fs::write(&video, b"data").unwrap();

    let server = MockHttpServer::start(vec![(422, r#"{"message": "Invalid request"}"#.to_string())]);
    let publisher = GitHubPublisher::new(
        Some("octo/lessons".to_string()),
        Some("t".to_string()),
        &settings(&server.base_url, None),
    )
    .unwrap();

    let err = publisher.publish(&video).await.unwrap_err();
    match err {
        ApiError::PublishFailed(msg) => assert!(msg.contains("422")),
        other => panic!("expected publish failure, got {}", other),
    }
    assert!(video.exists());

    let body = server.finish()[0].json();
    assert!(body.get("branch").is_none());
}

#[test]
fn test_missing_credentials_are_config_errors() {
    let err = GitHubPublisher::new(None, None, &PublishSettings::default())
        .err()
        .unwrap();
    assert!(matches!(err, ApiError::ConfigError(_)));
}
