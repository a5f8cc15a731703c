//! Session state across runs: current lesson, replaced artifacts, and failure diagnostics.

use crate::integration::test_utils::{
    build_loop, test_workspace, FakeRenderTool, RenderStep, ScriptedModel,
};
use lessonforge::session::SessionStore;
use lessonforge::{GenerationRequest, QualityTier, Subject};
use tempfile::TempDir;

#[tokio::test]
async fn test_new_success_replaces_previous_artifact() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "history");
    let store = SessionStore::new(workspace.session_file());

    let request =
        GenerationRequest::new("Momentum", Subject::Physics, QualityTier::Low, None, false)
            .unwrap();
    let model = ScriptedModel::new(vec![Ok("first".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);
    let report = build_loop(&model, &tool)
        .run(&workspace, &request, "momentum_v1")
        .await;

    let mut session = store.load("history").unwrap();
    store
        .commit_success(&mut session, &request, report.outcome.unwrap())
        .unwrap();
    let first_path = session
        .current_artifact
        .as_ref()
        .and_then(|a| a.local_path())
        .unwrap()
        .to_path_buf();
    assert!(first_path.exists());

    // Feedback run under a different output name
    let (prior, topic) = session.regeneration_base().unwrap();
    let (prior, topic) = (prior.clone(), topic.to_string());
    let model = ScriptedModel::new(vec![Ok("second".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);
    let report = build_loop(&model, &tool)
        .run_feedback(
            &workspace,
            &prior,
            "add labels",
            &topic,
            Subject::Physics,
            QualityTier::Low,
            "momentum_v2",
        )
        .await;
    let feedback_request =
        GenerationRequest::new(topic, Subject::Physics, QualityTier::Low, None, false).unwrap();
    store
        .commit_success(&mut session, &feedback_request, report.outcome.unwrap())
        .unwrap();

    assert!(!first_path.exists());
    let reloaded = store.load("history").unwrap();
    assert_eq!(reloaded.current_source.unwrap().text(), "second");
    assert_eq!(reloaded.topic.as_deref(), Some("Momentum"));
    assert!(reloaded
        .current_artifact
        .unwrap()
        .logical_filename
        .starts_with("momentum_v2"));
}

#[tokio::test]
async fn test_failed_run_keeps_current_lesson_and_records_diagnostic() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "keep");
    let store = SessionStore::new(workspace.session_file());
    let request =
        GenerationRequest::new("Waves", Subject::Physics, QualityTier::Medium, None, false)
            .unwrap();

    let model = ScriptedModel::new(vec![Ok("good".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);
    let report = build_loop(&model, &tool)
        .run(&workspace, &request, "lesson")
        .await;
    let mut session = store.load("keep").unwrap();
    store
        .commit_success(&mut session, &request, report.outcome.unwrap())
        .unwrap();

    let model = ScriptedModel::new(vec![Ok("b1".into()), Ok("b2".into()), Ok("b3".into())]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::Fail("IndexError: list index out of range".into()),
        RenderStep::Fail("IndexError: list index out of range".into()),
        RenderStep::Fail("TypeError: unsupported operand".into()),
    ]);
    let report = build_loop(&model, &tool)
        .run(&workspace, &request, "lesson")
        .await;
    let err = report.outcome.unwrap_err();
    session.record_failure(err.diagnostic().map(str::to_string));
    store.save(&session).unwrap();

    let reloaded = store.load("keep").unwrap();
    assert_eq!(reloaded.current_source.unwrap().text(), "good");
    assert!(reloaded.current_artifact.is_some());
    assert_eq!(
        reloaded.last_diagnostic.as_deref(),
        Some("TypeError: unsupported operand")
    );
}

#[tokio::test]
async fn test_sessions_do_not_share_state() {
    let temp = TempDir::new().unwrap();
    let a = test_workspace(&temp, "alpha");
    let b = test_workspace(&temp, "beta");
    assert_ne!(a.session_dir(), b.session_dir());

    let request =
        GenerationRequest::new("Orbits", Subject::Physics, QualityTier::Low, None, false)
            .unwrap();
    let model = ScriptedModel::new(vec![Ok("orbit".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);
    let report = build_loop(&model, &tool)
        .run(&a, &request, "lesson")
        .await;
    let store_a = SessionStore::new(a.session_file());
    let mut session = store_a.load("alpha").unwrap();
    store_a
        .commit_success(&mut session, &request, report.outcome.unwrap())
        .unwrap();

    let other = SessionStore::new(b.session_file()).load("beta").unwrap();
    assert!(other.current_source.is_none());
    assert!(other.regeneration_base().is_err());
    assert!(!b.output_root().exists());
}

#[tokio::test]
async fn test_failed_generate_keeps_topic_for_regeneration() {
    let temp = TempDir::new().unwrap();
    let workspace = test_workspace(&temp, "rebind");
    let store = SessionStore::new(workspace.session_file());

    let sorting = GenerationRequest::new(
        "Bubble Sort",
        Subject::ComputerScience,
        QualityTier::Low,
        None,
        false,
    )
    .unwrap();
    let model = ScriptedModel::new(vec![Ok("class SceneTopic: bubble sort".into())]);
    let tool = FakeRenderTool::new(vec![RenderStep::Succeed]);
    let report = build_loop(&model, &tool)
        .run(&workspace, &sorting, "lesson")
        .await;
    let mut session = store.load("rebind").unwrap();
    store
        .commit_success(&mut session, &sorting, report.outcome.unwrap())
        .unwrap();

    // A different request that never renders.
    let osmosis =
        GenerationRequest::new("Osmosis", Subject::Biology, QualityTier::High, None, false)
            .unwrap();
    let model = ScriptedModel::new(vec![Ok("o1".into()), Ok("o2".into()), Ok("o3".into())]);
    let tool = FakeRenderTool::new(vec![
        RenderStep::Fail("SyntaxError: invalid syntax".into()),
        RenderStep::Fail("SyntaxError: invalid syntax".into()),
        RenderStep::Fail("SyntaxError: invalid syntax".into()),
    ]);
    let report = build_loop(&model, &tool)
        .run(&workspace, &osmosis, "lesson")
        .await;
    let err = report.outcome.unwrap_err();
    session.record_failure(err.diagnostic().map(str::to_string));
    store.save(&session).unwrap();

    let reloaded = store.load("rebind").unwrap();
    let (source, topic) = reloaded.regeneration_base().unwrap();
    assert_eq!(source.text(), "class SceneTopic: bubble sort");
    assert_eq!(topic, "Bubble Sort");
    assert_eq!(reloaded.subject, Subject::ComputerScience);
    assert_eq!(reloaded.quality, QualityTier::Low);
    assert_eq!(
        reloaded.last_diagnostic.as_deref(),
        Some("SyntaxError: invalid syntax")
    );
}
