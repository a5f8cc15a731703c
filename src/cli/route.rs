//! CLI route: single route table and run context. Dispatches to pipeline services and
//! presentation.

use crate::cli::help::command_name;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_cleanup_report, format_diagnostic, format_lesson_ready, format_presets,
};
use crate::config::{validate_output_name, ConfigLoader, LessonConfig};
use crate::error::ApiError;
use crate::generator::CodeGenerator;
use crate::orchestrator::{LoopReport, OrchestrationLoop};
use crate::prompt::effects_chain_available;
use crate::provider::ClientFactory;
use crate::publish::GitHubPublisher;
use crate::render::Renderer;
use crate::session::{LessonSession, SessionStore};
use crate::types::{GenerationRequest, QualityTier, VoicePreset};
use crate::workspace::{CleanupPolicy, Workspace};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, session and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    session_id: String,
    config: LessonConfig,
}

/// Arguments shared by generate and regenerate once parsed.
struct RunOptions<'a> {
    output_name: &'a str,
    publisher: Option<GitHubPublisher>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        session_id: String,
    ) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::with_config(workspace_root, session_id, config)
    }

    pub fn with_config(
        workspace_root: PathBuf,
        session_id: String,
        config: LessonConfig,
    ) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        Ok(Self {
            workspace_root,
            session_id,
            config,
        })
    }

    pub fn config(&self) -> &LessonConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        info!(
            command = command_name(command),
            session_id = %self.session_id,
            "Executing command"
        );
        let result = self.execute_inner(command);
        debug!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                topic,
                subject,
                quality,
                voice,
                no_effects,
                publish,
                output_name,
                details: _,
            } => {
                let request = GenerationRequest::new(
                    topic.as_str(),
                    *subject,
                    *quality,
                    *voice,
                    !no_effects,
                )?;
                self.handle_generate(request, *publish, output_name.as_deref())
            }
            Commands::Regenerate {
                feedback,
                quality,
                voice,
                publish,
                details: _,
            } => self.handle_regenerate(feedback, *quality, *voice, *publish),
            Commands::Diagnostics => self.handle_diagnostics(),
            Commands::Clean => self.handle_clean(),
            Commands::Presets => Ok(format_presets(effects_chain_available())),
        }
    }

    /// Last failure diagnostic stored for this session, if any.
    pub fn last_diagnostic(&self) -> Option<String> {
        let workspace = self.workspace().ok()?;
        SessionStore::new(workspace.session_file())
            .load(&self.session_id)
            .ok()?
            .last_diagnostic
    }

    fn handle_generate(
        &self,
        request: GenerationRequest,
        publish: bool,
        output_name: Option<&str>,
    ) -> Result<String, ApiError> {
        let output_name = output_name.unwrap_or(&self.config.renderer.output_name);
        validate_output_name(output_name).map_err(ApiError::InvalidRequest)?;
        let options = RunOptions {
            output_name,
            publisher: self.publisher(publish)?,
        };

        let workspace = self.workspace()?;
        let store = SessionStore::new(workspace.session_file());
        let session = store.load(&self.session_id)?;

        let wants_effects = request.voice().is_some() && request.use_effects_chain();
        let orchestrator = self.orchestrator(wants_effects);
        let runtime = runtime()?;
        let report = runtime.block_on(orchestrator.run(&workspace, &request, options.output_name));
        self.finish(&runtime, report, &store, session, &request, options)
    }

    fn handle_regenerate(
        &self,
        feedback: &str,
        quality: Option<QualityTier>,
        voice: Option<VoicePreset>,
        publish: bool,
    ) -> Result<String, ApiError> {
        let workspace = self.workspace()?;
        let store = SessionStore::new(workspace.session_file());
        let session = store.load(&self.session_id)?;
        let (prior, topic) = session.regeneration_base()?;
        let prior = prior.clone();

        // Applied to the session only if the feedback run succeeds.
        let request = GenerationRequest::new(
            topic,
            session.subject,
            quality.unwrap_or(session.quality),
            voice.or(session.voice),
            false,
        )?;
        let feedback = feedback_with_voice(feedback, voice);

        let options = RunOptions {
            output_name: &self.config.renderer.output_name,
            publisher: self.publisher(publish)?,
        };
        let orchestrator = self.orchestrator(false);
        let runtime = runtime()?;
        let report = runtime.block_on(orchestrator.run_feedback(
            &workspace,
            &prior,
            &feedback,
            request.topic(),
            request.subject(),
            request.quality(),
            options.output_name,
        ));
        self.finish(&runtime, report, &store, session, &request, options)
    }

    fn finish(
        &self,
        runtime: &Runtime,
        report: LoopReport,
        store: &SessionStore,
        mut session: LessonSession,
        request: &GenerationRequest,
        options: RunOptions<'_>,
    ) -> Result<String, ApiError> {
        let render_attempts = report.render_attempts;
        let output = match report.outcome {
            Ok(output) => output,
            Err(err) => {
                let diagnostic = err
                    .diagnostic()
                    .map(str::to_string)
                    .or(report.last_diagnostic);
                session.record_failure(diagnostic);
                store.save(&session)?;
                return Err(err);
            }
        };

        let artifact = output.artifact.clone();
        store.commit_success(&mut session, request, output)?;

        let artifact = match (options.publisher, artifact.local_path()) {
            (Some(publisher), Some(path)) => {
                let url = runtime.block_on(publisher.publish(path))?;
                let remote = artifact.clone().into_remote(url);
                session.set_artifact(remote.clone());
                store.save(&session)?;
                remote
            }
            _ => artifact,
        };

        Ok(format_lesson_ready(&artifact, render_attempts))
    }

    fn handle_diagnostics(&self) -> Result<String, ApiError> {
        let workspace = self.workspace()?;
        let session = SessionStore::new(workspace.session_file()).load(&self.session_id)?;
        Ok(format_diagnostic(&session))
    }

    fn handle_clean(&self) -> Result<String, ApiError> {
        let workspace = self.workspace()?;
        let report = runtime()?.block_on(workspace.cleanup_all());
        Ok(format_cleanup_report(&report))
    }

    fn workspace(&self) -> Result<Workspace, ApiError> {
        Workspace::open(
            &self.workspace_root,
            &self.session_id,
            CleanupPolicy::from(&self.config.workspace),
        )
    }

    // Credentials are checked before any generation work starts.
    fn publisher(&self, publish: bool) -> Result<Option<GitHubPublisher>, ApiError> {
        if publish {
            GitHubPublisher::from_settings(&self.config.publish).map(Some)
        } else {
            Ok(None)
        }
    }

    fn orchestrator(&self, wants_effects: bool) -> OrchestrationLoop {
        let factory: Arc<dyn ClientFactory> = Arc::new(self.config.provider.clone());
        let generator = Arc::new(CodeGenerator::new(
            factory,
            self.config.models.clone(),
            self.config.generation.clone(),
        ));
        let renderer = Arc::new(Renderer::from_settings(self.config.renderer.clone()));
        OrchestrationLoop::new(generator, renderer, self.config.generation.max_render_attempts)
            .with_effects_available(wants_effects && effects_chain_available())
    }
}

fn runtime() -> Result<Runtime, ApiError> {
    Runtime::new()
        .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))
}

fn feedback_with_voice(feedback: &str, voice: Option<VoicePreset>) -> String {
    match voice {
        Some(preset) => format!(
            "{}\nUse the {} narration voice ({}).",
            feedback.trim(),
            preset.key(),
            preset.description()
        ),
        None => feedback.trim().to_string(),
    }
}
