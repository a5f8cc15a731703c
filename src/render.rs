//! Renderer: runs the external animation tool against a candidate source and interprets
//! the result.
//!
//! Failures are values ([`RenderOutcome::Failure`]), never errors; only workspace I/O
//! (writing the source slot) can make [`Renderer::render`] return `Err`.

use crate::config::RendererSettings;
use crate::error::ApiError;
use crate::locator::ArtifactLocator;
use crate::types::{CandidateSource, QualityTier};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Why a render attempt failed. The orchestration loop treats every kind the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Tool exited unsuccessfully; `None` when killed by a signal
    NonZeroExit(Option<i32>),
    /// Tool reported success but no artifact was found
    ArtifactNotLocated,
    TimedOut(Duration),
    /// Tool could not be started (usually missing from PATH)
    SpawnFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NonZeroExit(Some(code)) => write!(f, "exit code {}", code),
            FailureKind::NonZeroExit(None) => f.write_str("terminated by signal"),
            FailureKind::ArtifactNotLocated => f.write_str("artifact not located"),
            FailureKind::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            FailureKind::SpawnFailed => f.write_str("spawn failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Success {
        artifact_path: PathBuf,
    },
    Failure {
        kind: FailureKind,
        diagnostic: String,
    },
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success { .. })
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderOutcome::Failure { diagnostic, .. } => Some(diagnostic),
            RenderOutcome::Success { .. } => None,
        }
    }
}

/// Diagnostic used when the tool exits cleanly but leaves no artifact.
pub const ARTIFACT_NOT_LOCATED: &str = "Rendered successfully but could not locate output file.";

/// Everything needed to run the tool once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInvocation {
    pub program: String,
    pub quality_flag: &'static str,
    pub output_name: String,
    pub media_dir: PathBuf,
    pub source_path: PathBuf,
    pub entry_point: &'static str,
    pub extra_args: Vec<String>,
    pub working_dir: PathBuf,
}

impl RenderInvocation {
    /// `<flag> -o <name> --media_dir <dir> [extra..] <source> <entry>`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.quality_flag.into(),
            "-o".into(),
            self.output_name.clone().into(),
            "--media_dir".into(),
            self.media_dir.clone().into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(self.source_path.clone().into());
        args.push(self.entry_point.into());
        args
    }
}

/// Captured result of a tool run that exited on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRun {
    Exited(ToolOutput),
    TimedOut(Duration),
    SpawnFailed(String),
}

/// Boundary to the external rendering tool.
#[async_trait]
pub trait RenderTool: Send + Sync {
    async fn run(&self, invocation: &RenderInvocation) -> ToolRun;
}

/// Runs the tool as a child process, killing it when `timeout` expires.
pub struct ProcessRenderTool {
    timeout: Duration,
}

impl ProcessRenderTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RenderTool for ProcessRenderTool {
    async fn run(&self, invocation: &RenderInvocation) -> ToolRun {
        let mut command = Command::new(&invocation.program);
        command
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolRun::SpawnFailed(format!(
                    "Failed to start renderer '{}': {}",
                    invocation.program, e
                ))
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ToolRun::Exited(ToolOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => ToolRun::SpawnFailed(format!("Failed to wait for renderer: {}", e)),
            Err(_) => ToolRun::TimedOut(self.timeout),
        }
    }
}

pub struct Renderer {
    tool: Arc<dyn RenderTool>,
    settings: RendererSettings,
}

impl Renderer {
    pub fn new(tool: Arc<dyn RenderTool>, settings: RendererSettings) -> Self {
        Self { tool, settings }
    }

    /// Renderer backed by the configured program.
    pub fn from_settings(settings: RendererSettings) -> Self {
        let tool = Arc::new(ProcessRenderTool::new(settings.timeout()));
        Self::new(tool, settings)
    }

    /// Render `source` once. Transient render files are cleaned afterwards regardless of
    /// the outcome.
    pub async fn render(
        &self,
        workspace: &Workspace,
        source: &CandidateSource,
        output_name: &str,
        tier: QualityTier,
    ) -> Result<RenderOutcome, ApiError> {
        let source_path = workspace.write_source(source)?;
        let invocation = self.invocation(workspace, &source_path, source, output_name, tier);

        debug!(
            program = %invocation.program,
            tier = %tier,
            output_name,
            "Starting render"
        );
        let started = Instant::now();
        let run = self.tool.run(&invocation).await;
        let outcome = interpret(run, &workspace.output_root(), output_name, tier);
        workspace.cleanup_transient().await;

        match &outcome {
            RenderOutcome::Success { artifact_path } => info!(
                artifact = %artifact_path.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Render succeeded"
            ),
            RenderOutcome::Failure { kind, .. } => warn!(
                kind = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Render failed"
            ),
        }
        Ok(outcome)
    }

    fn invocation(
        &self,
        workspace: &Workspace,
        source_path: &Path,
        source: &CandidateSource,
        output_name: &str,
        tier: QualityTier,
    ) -> RenderInvocation {
        RenderInvocation {
            program: self.settings.program.clone(),
            quality_flag: tier.render_flag(),
            output_name: output_name.to_string(),
            media_dir: workspace.output_root(),
            source_path: source_path.to_path_buf(),
            entry_point: source.entry_point(),
            extra_args: self.settings.extra_args.clone(),
            working_dir: workspace.session_dir().to_path_buf(),
        }
    }
}

fn interpret(
    run: ToolRun,
    output_root: &Path,
    output_name: &str,
    tier: QualityTier,
) -> RenderOutcome {
    match run {
        ToolRun::Exited(output) if output.success => {
            match ArtifactLocator::locate(output_root, output_name, tier) {
                Some(artifact_path) => RenderOutcome::Success { artifact_path },
                None => RenderOutcome::Failure {
                    kind: FailureKind::ArtifactNotLocated,
                    diagnostic: ARTIFACT_NOT_LOCATED.to_string(),
                },
            }
        }
        ToolRun::Exited(output) => {
            let diagnostic = exit_diagnostic(&output);
            RenderOutcome::Failure {
                kind: FailureKind::NonZeroExit(output.exit_code),
                diagnostic,
            }
        }
        ToolRun::TimedOut(limit) => RenderOutcome::Failure {
            kind: FailureKind::TimedOut(limit),
            diagnostic: format!(
                "Renderer did not finish within {} seconds and was stopped.",
                limit.as_secs_f64()
            ),
        },
        ToolRun::SpawnFailed(message) => RenderOutcome::Failure {
            kind: FailureKind::SpawnFailed,
            diagnostic: message,
        },
    }
}

// stderr first; some tools report errors on stdout
fn exit_diagnostic(output: &ToolOutput) -> String {
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    match output.exit_code {
        Some(code) => format!("Renderer exited with code {} and no output", code),
        None => "Renderer was terminated by a signal".to_string(),
    }
}
