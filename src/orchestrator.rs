//! Orchestration loop: generate, render, diagnose, repair.
//!
//! ```text
//! Init -> Generating -> Rendering -> Success
//!                           |
//!                           +-> Repairing -> Rendering   (attempt < budget)
//!                           +-> ExhaustedFailure         (attempt == budget)
//! ```
//!
//! Feedback runs replace `Generating` with `Regenerating` and start with a fresh budget.

use crate::error::ApiError;
use crate::generator::CodeGenerator;
use crate::prompt::PromptSpec;
use crate::render::{RenderOutcome, Renderer};
use crate::repair::{Regenerator, Repairer};
use crate::types::{ArtifactHandle, CandidateSource, GenerationRequest, QualityTier, Subject};
use crate::workspace::Workspace;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Generating,
    Regenerating,
    Rendering,
    Repairing,
    Success,
    ExhaustedFailure,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Init => "init",
            LoopState::Generating => "generating",
            LoopState::Regenerating => "regenerating",
            LoopState::Rendering => "rendering",
            LoopState::Repairing => "repairing",
            LoopState::Success => "success",
            LoopState::ExhaustedFailure => "exhausted_failure",
        };
        f.write_str(name)
    }
}

/// Mutable state of one run. Lives only as long as the run.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt_index: usize,
    pub current_source: CandidateSource,
    pub last_diagnostic: Option<String>,
}

impl RetryState {
    fn new(source: CandidateSource) -> Self {
        Self {
            attempt_index: 0,
            current_source: source,
            last_diagnostic: None,
        }
    }
}

/// A rendered lesson and the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonOutput {
    pub artifact: ArtifactHandle,
    pub source: CandidateSource,
}

/// Terminal result of a run.
#[derive(Debug)]
pub struct LoopReport {
    pub outcome: Result<LessonOutput, ApiError>,
    /// Render attempts used, repairs included
    pub render_attempts: usize,
    /// States visited, in order
    pub states: Vec<LoopState>,
    pub last_diagnostic: Option<String>,
}

impl LoopReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn final_state(&self) -> LoopState {
        self.states.last().copied().unwrap_or(LoopState::Init)
    }
}

/// Fixed inputs shared by every render attempt of one run.
struct RunTarget<'a> {
    workspace: &'a Workspace,
    topic: &'a str,
    tier: QualityTier,
    output_name: &'a str,
}

/// Records state transitions for one run.
struct Trace<'a> {
    session_id: &'a str,
    states: Vec<LoopState>,
}

impl<'a> Trace<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            states: vec![LoopState::Init],
        }
    }

    fn enter(&mut self, state: LoopState, attempt: usize) {
        debug!(
            session_id = self.session_id,
            attempt,
            state = %state,
            "Loop transition"
        );
        self.states.push(state);
    }
}

pub struct OrchestrationLoop {
    generator: Arc<CodeGenerator>,
    renderer: Arc<Renderer>,
    repairer: Repairer,
    regenerator: Regenerator,
    max_render_attempts: usize,
    effects_available: bool,
}

impl OrchestrationLoop {
    pub fn new(
        generator: Arc<CodeGenerator>,
        renderer: Arc<Renderer>,
        max_render_attempts: usize,
    ) -> Self {
        Self {
            repairer: Repairer::new(generator.clone()),
            regenerator: Regenerator::new(generator.clone()),
            generator,
            renderer,
            max_render_attempts: max_render_attempts.max(1),
            effects_available: false,
        }
    }

    /// Whether the audio effects chain can run on this machine.
    pub fn with_effects_available(mut self, available: bool) -> Self {
        self.effects_available = available;
        self
    }

    /// Fresh lesson for `request`.
    pub async fn run(
        &self,
        workspace: &Workspace,
        request: &GenerationRequest,
        output_name: &str,
    ) -> LoopReport {
        let mut trace = Trace::new(workspace.session_id());
        info!(
            session_id = workspace.session_id(),
            topic = request.topic(),
            tier = %request.quality(),
            "Starting lesson generation"
        );

        trace.enter(LoopState::Generating, 0);
        let spec = PromptSpec::lesson(request, self.effects_available);
        let source = match self.generator.produce(&spec).await {
            Ok(source) => source,
            Err(err) => return Self::generation_failed(trace, err, 0, None),
        };

        let target = RunTarget {
            workspace,
            topic: request.topic(),
            tier: request.quality(),
            output_name,
        };
        self.render_until_done(&target, source, trace).await
    }

    /// Revise `prior` according to `feedback`, then render with a fresh budget.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_feedback(
        &self,
        workspace: &Workspace,
        prior: &CandidateSource,
        feedback: &str,
        topic: &str,
        subject: Subject,
        tier: QualityTier,
        output_name: &str,
    ) -> LoopReport {
        let mut trace = Trace::new(workspace.session_id());
        info!(
            session_id = workspace.session_id(),
            topic,
            tier = %tier,
            "Starting feedback regeneration"
        );

        trace.enter(LoopState::Regenerating, 0);
        let source = match self
            .regenerator
            .regenerate(prior, feedback, topic, subject, tier)
            .await
        {
            Ok(source) => source,
            Err(err) => return Self::generation_failed(trace, err, 0, None),
        };

        let target = RunTarget {
            workspace,
            topic,
            tier,
            output_name,
        };
        self.render_until_done(&target, source, trace).await
    }

    async fn render_until_done(
        &self,
        target: &RunTarget<'_>,
        source: CandidateSource,
        mut trace: Trace<'_>,
    ) -> LoopReport {
        let mut state = RetryState::new(source);

        loop {
            trace.enter(LoopState::Rendering, state.attempt_index);
            let outcome = match self
                .renderer
                .render(
                    target.workspace,
                    &state.current_source,
                    target.output_name,
                    target.tier,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    let attempts = state.attempt_index + 1;
                    return Self::generation_failed(trace, err, attempts, state.last_diagnostic);
                }
            };

            let diagnostic = match outcome {
                RenderOutcome::Success { artifact_path } => {
                    trace.enter(LoopState::Success, state.attempt_index);
                    info!(
                        session_id = trace.session_id,
                        attempts = state.attempt_index + 1,
                        artifact = %artifact_path.display(),
                        "Lesson rendered"
                    );
                    return LoopReport {
                        outcome: Ok(LessonOutput {
                            artifact: ArtifactHandle::local(artifact_path, target.tier),
                            source: state.current_source,
                        }),
                        render_attempts: state.attempt_index + 1,
                        states: trace.states,
                        last_diagnostic: state.last_diagnostic,
                    };
                }
                RenderOutcome::Failure { diagnostic, .. } => diagnostic,
            };

            state.attempt_index += 1;
            state.last_diagnostic = Some(diagnostic);

            if state.attempt_index >= self.max_render_attempts {
                return Self::exhausted(trace, state, "render budget exhausted");
            }

            trace.enter(LoopState::Repairing, state.attempt_index);
            let diagnostic = state.last_diagnostic.as_deref().unwrap_or_default();
            let repaired = match self
                .repairer
                .repair(&state.current_source, diagnostic, target.topic, target.tier)
                .await
            {
                Ok(repaired) => repaired,
                Err(err) => {
                    let attempts = state.attempt_index;
                    return Self::generation_failed(trace, err, attempts, state.last_diagnostic);
                }
            };

            if repaired.text() == state.current_source.text() {
                warn!(
                    session_id = trace.session_id,
                    attempt = state.attempt_index,
                    "Repair returned the failing source unchanged"
                );
                return Self::exhausted(trace, state, "repair produced no change");
            }
            state.current_source = repaired;
        }
    }

    fn generation_failed(
        mut trace: Trace<'_>,
        err: ApiError,
        render_attempts: usize,
        last_diagnostic: Option<String>,
    ) -> LoopReport {
        trace.enter(LoopState::ExhaustedFailure, render_attempts);
        warn!(session_id = trace.session_id, error = %err, "Lesson run stopped");
        LoopReport {
            outcome: Err(err),
            render_attempts,
            states: trace.states,
            last_diagnostic,
        }
    }

    fn exhausted(mut trace: Trace<'_>, state: RetryState, reason: &str) -> LoopReport {
        trace.enter(LoopState::ExhaustedFailure, state.attempt_index);
        warn!(
            session_id = trace.session_id,
            attempts = state.attempt_index,
            reason,
            "Render attempts exhausted"
        );
        LoopReport {
            outcome: Err(ApiError::ExhaustedRetries {
                attempts: state.attempt_index,
                reason: reason.to_string(),
                last_diagnostic: state.last_diagnostic.clone(),
            }),
            render_attempts: state.attempt_index,
            states: trace.states,
            last_diagnostic: state.last_diagnostic,
        }
    }
}
