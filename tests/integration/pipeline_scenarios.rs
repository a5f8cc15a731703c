//! End-to-end loop scenarios with a scripted model and a scripted renderer.

use crate::integration::test_utils::{
    build_loop, test_workspace, FakeRenderTool, RenderStep, ScriptedModel,
};
use lessonforge::error::ApiError;
use lessonforge::render::ARTIFACT_NOT_LOCATED;
use lessonforge::{GenerationRequest, LoopState, QualityTier, Subject};
use tempfile::TempDir;

const FIRST: &str = "from manim import *\nclass SceneTopic(Scene):\n    def construct(self):\n        sq = Sqaure()";
const REPAIRED: &str = "from manim import *\nclass SceneTopic(Scene):\n    def construct(self):\n        sq = Square()";

fn request(topic: &str, tier: QualityTier) -> GenerationRequest {
    GenerationRequest::new(topic, Subject::General, tier, None, false).unwrap()
}

#[tokio::test]
async fn repair_after_render_failure_produces_artifact() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "repair");
    let model = ScriptedModel::new(vec![
        Ok(format!("```python\n{}\n```", FIRST)),
        Ok(REPAIRED.to_string()),
    ]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::Fail("NameError: name 'Sqaure' is not defined".to_string()),
        RenderStep::Succeed,
    ]);

    let report = build_loop(&model, &tool)
        .run(&workspace, &request("Squares", QualityTier::Low), "lesson")
        .await;

    assert!(report.is_success());
    assert_eq!(report.render_attempts, 2);
    let output = report.outcome.unwrap();
    assert_eq!(output.source.text(), REPAIRED);
    let path = output.artifact.local_path().unwrap();
    assert!(path.exists());
    assert!(path.to_string_lossy().contains("480p15"));

    let sources = tool.rendered_sources();
    assert_eq!(sources, vec![FIRST.to_string(), REPAIRED.to_string()]);

    // The repair prompt carries the failing source and its diagnostic.
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].user_prompt.contains("Sqaure()"));
    assert!(calls[1].user_prompt.contains("NameError"));
}

#[tokio::test]
async fn quota_exhaustion_never_reaches_renderer() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "quota");
    let model = ScriptedModel::new(vec![
        Err(ApiError::ProviderRateLimit("RESOURCE_EXHAUSTED".into())),
        Err(ApiError::ProviderRateLimit("RESOURCE_EXHAUSTED".into())),
        Err(ApiError::ProviderRateLimit("RESOURCE_EXHAUSTED".into())),
    ]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);

    let report = build_loop(&model, &tool)
        .run(&workspace, &request("Limits", QualityTier::High), "lesson")
        .await;

    assert_eq!(tool.invocations(), 0);
    assert_eq!(report.render_attempts, 0);
    assert_eq!(report.final_state(), LoopState::ExhaustedFailure);
    match report.outcome {
        Err(ApiError::GenerationFailed(msg)) => {
            assert!(msg.contains("Failed to generate code after 3 attempts"))
        }
        other => panic!("expected generation failure, got {:?}", other.err()),
    }

    // First call on the tier model, the rest on the fallback.
    let calls = model.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].model, "gemini-2.0-pro-exp-02-05");
    assert!(calls[1..].iter().all(|c| c.model == "gemini-2.0-flash-lite"));
}

#[tokio::test]
async fn missing_artifact_counts_as_failure_until_budget_is_spent() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "noartifact");
    let model = ScriptedModel::new(vec![
        Ok("v1".to_string()),
        Ok("v2".to_string()),
        Ok("v3".to_string()),
    ]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::SucceedWithoutArtifact,
        RenderStep::SucceedWithoutArtifact,
        RenderStep::SucceedWithoutArtifact,
    ]);

    let report = build_loop(&model, &tool)
        .run(&workspace, &request("Ghost", QualityTier::Medium), "lesson")
        .await;

    assert_eq!(tool.invocations(), 3);
    // One initial generation and two repairs.
    assert_eq!(model.calls().len(), 3);
    assert_eq!(report.render_attempts, 3);
    match report.outcome {
        Err(ApiError::ExhaustedRetries {
            attempts,
            last_diagnostic,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_diagnostic.as_deref(), Some(ARTIFACT_NOT_LOCATED));
        }
        other => panic!("expected exhausted retries, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn render_attempts_are_capped() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "cap");
    let responses = (0..10).map(|i| Ok(format!("attempt {}", i))).collect();
    let model = ScriptedModel::new(responses);
    let steps = (0..10).map(|_| RenderStep::Fail("boom".to_string())).collect();
    let tool = FakeRenderTool::new(steps);

    let report = build_loop(&model, &tool)
        .run(&workspace, &request("Cap", QualityTier::Low), "lesson")
        .await;

    assert!(!report.is_success());
    assert_eq!(tool.invocations(), 3);
    assert_eq!(model.calls().len(), 3);
    let renders = report
        .states
        .iter()
        .filter(|s| **s == LoopState::Rendering)
        .count();
    assert_eq!(renders, 3);
}

#[tokio::test]
async fn feedback_starts_a_fresh_render_budget() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "feedback");

    // First run spends its whole budget.
    let model = ScriptedModel::new(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::Fail("e1".into()),
        RenderStep::Fail("e2".into()),
        RenderStep::Fail("e3".into()),
    ]);
    let first = build_loop(&model, &tool)
        .run(&workspace, &request("Fractions", QualityTier::Low), "lesson")
        .await;
    assert!(!first.is_success());

    // Feedback on the last candidate gets three new attempts.
    let model = ScriptedModel::new(vec![Ok("d".into()), Ok("e".into()), Ok("f".into())]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::Fail("e4".into()),
        RenderStep::Fail("e5".into()),
        RenderStep::Succeed,
    ]);
    let prior = lessonforge::CandidateSource::new("c");
    let report = build_loop(&model, &tool)
        .run_feedback(
            &workspace,
            &prior,
            "Use slower transitions",
            "Fractions",
            Subject::Mathematics,
            QualityTier::Low,
            "lesson",
        )
        .await;

    assert!(report.is_success());
    assert_eq!(report.render_attempts, 3);
    assert_eq!(
        report.states[..2],
        [LoopState::Init, LoopState::Regenerating]
    );
    let calls = model.calls();
    assert!(calls[0].user_prompt.contains("Use slower transitions"));
    assert_eq!(tool.rendered_sources(), vec!["d", "e", "f"]);
}

#[tokio::test]
async fn transient_render_files_are_removed_after_each_attempt() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "transient");
    let model = ScriptedModel::new(vec![Ok("x".into()), Ok("y".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Fail("bad".into()), RenderStep::Succeed]);

    let report = build_loop(&model, &tool)
        .run(&workspace, &request("Tidy", QualityTier::Medium), "lesson")
        .await;
    assert!(report.is_success());

    let leftovers: Vec<_> = walkdir::WalkDir::new(workspace.session_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() == "partial_movie_files")
        .collect();
    assert!(leftovers.is_empty());
}
