//! The `lessonforge` binary end to end: a local model endpoint and a shell-script renderer.
#![cfg(unix)]

use crate::integration::test_utils::MockHttpServer;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn gemini_reply(code: &str) -> (u16, String) {
    let body = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": format!("```python\n{}\n```", code)}]},
            "finishReason": "STOP"
        }]
    });
    (200, body.to_string())
}

struct Harness {
    temp: TempDir,
    workspace: PathBuf,
    renderer: PathBuf,
}

impl Harness {
    fn new(renderer_body: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("ws");
        fs::create_dir_all(temp.path().join("xdg")).unwrap();
        fs::create_dir_all(&workspace).unwrap();
        let renderer = temp.path().join("fake-manim.sh");
        fs::write(&renderer, format!("#!/bin/sh\n{}\n", renderer_body)).unwrap();
        fs::set_permissions(&renderer, fs::Permissions::from_mode(0o755)).unwrap();
        Self {
            temp,
            workspace,
            renderer,
        }
    }

    fn run(&self, endpoint: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_lessonforge"))
            .env("XDG_CONFIG_HOME", self.temp.path().join("xdg"))
            .env("LESSONFORGE_ENV", "test")
            .env("LESSONFORGE__PROVIDER__API_KEY", "test-key")
            .env("LESSONFORGE__PROVIDER__ENDPOINT", endpoint)
            .env("LESSONFORGE__RENDERER__PROGRAM", &self.renderer)
            .env("LESSONFORGE__GENERATION__QUOTA_BACKOFF_MS", "0")
            .arg("--workspace")
            .arg(&self.workspace)
            .arg("--log-level")
            .arg("off")
            .args(args)
            .output()
            .unwrap()
    }

    fn session_file(&self) -> PathBuf {
        self.workspace
            .join(".lessonforge/sessions/default/session.json")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// $3 output name, $5 media dir
const WRITES_ARTIFACT: &str = r#"out="$5/videos/scene_topic/480p15"
mkdir -p "$out"
printf video > "$out/$3.mp4""#;

#[test]
fn test_generate_then_regenerate() {
    let harness = Harness::new(WRITES_ARTIFACT);
    let server = MockHttpServer::start(vec![
        gemini_reply("class SceneTopic(Scene):\n    pass"),
        gemini_reply("class SceneTopic(Scene):\n    def construct(self): self.wait(2)"),
    ]);

    let output = harness.run(
        &server.base_url,
        &["generate", "Photosynthesis", "--quality", "low", "--subject", "biology"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Lesson ready"));
    assert!(stdout(&output).contains("lesson.mp4"));

    let session: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(harness.session_file()).unwrap()).unwrap();
    assert_eq!(session["topic"], "Photosynthesis");
    assert!(session["current_source"].to_string().contains("SceneTopic"));

    let output = harness.run(
        &server.base_url,
        &["regenerate", "--feedback", "Pause for two seconds"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let requests = server.finish();
    assert_eq!(requests.len(), 2);
    let feedback_prompt = requests[1].body.clone();
    assert!(feedback_prompt.contains("Pause for two seconds"));
    assert!(feedback_prompt.contains("Photosynthesis"));
}

#[test]
fn test_failed_generate_does_not_replace_regeneration_topic() {
    let harness = Harness::new(WRITES_ARTIFACT);
    let server = MockHttpServer::start(vec![
        gemini_reply("class SceneTopic(Scene):\n    pass"),
        (401, r#"{"error": {"message": "API key not valid"}}"#.to_string()),
        gemini_reply("class SceneTopic(Scene):\n    def construct(self): self.wait(1)"),
    ]);

    let output = harness.run(&server.base_url, &["generate", "Bubble Sort", "--quality", "low"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = harness.run(
        &server.base_url,
        &["generate", "Osmosis", "--quality", "high", "--subject", "biology"],
    );
    assert!(!output.status.success());

    let session: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(harness.session_file()).unwrap()).unwrap();
    assert_eq!(session["topic"], "Bubble Sort");
    assert_eq!(session["quality"], serde_json::json!("low"));

    let output = harness.run(&server.base_url, &["regenerate", "--feedback", "Slower swaps"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let requests = server.finish();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].body.contains("Bubble Sort"));
    assert!(!requests[2].body.contains("Osmosis"));
}

#[test]
fn test_failed_run_keeps_diagnostic_out_of_the_summary() {
    let harness = Harness::new("echo \"NameError: name 'Circel' is not defined\" >&2\nexit 1");
    let server = MockHttpServer::start(vec![
        gemini_reply("v1"),
        gemini_reply("v2"),
        gemini_reply("v3"),
    ]);

    let output = harness.run(&server.base_url, &["generate", "Circles", "--quality", "low"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("lessonforge diagnostics"));
    assert!(!err.contains("Circel"));
    assert_eq!(server.finish().len(), 3);

    let output = harness.run("http://127.0.0.1:9", &["diagnostics"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("NameError: name 'Circel' is not defined"));
}

#[test]
fn test_regenerate_without_lesson_fails() {
    let harness = Harness::new("exit 0");
    let output = harness.run("http://127.0.0.1:9", &["regenerate", "--feedback", "slower"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no lesson to regenerate"));
}

#[test]
fn test_clean_removes_temporary_files() {
    let harness = Harness::new("exit 0");
    let session_dir = harness.workspace.join(".lessonforge/sessions/default");
    fs::create_dir_all(session_dir.join("__pycache__")).unwrap();
    fs::create_dir_all(session_dir.join("media/videos/scene_topic/720p30/partial_movie_files"))
        .unwrap();
    fs::write(session_dir.join("scene_topic.py"), "pass").unwrap();

    let output = harness.run("http://127.0.0.1:9", &["clean"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!session_dir.join("scene_topic.py").exists());
    assert!(!session_dir.join("__pycache__").exists());
    assert!(!exists_named(&session_dir, "partial_movie_files"));
}

fn exists_named(root: &Path, name: &str) -> bool {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_name() == name)
}
