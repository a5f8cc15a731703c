//! Configuration System
//!
//! Layered configuration for the lesson pipeline: built-in defaults, the user's global
//! config file, workspace config files, then `LESSONFORGE__SECTION__KEY` environment
//! variables. See [`ConfigLoader`] for the precedence rules.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::types::QualityTier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonConfig {
    /// Model backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Tier to model mapping
    #[serde(default)]
    pub models: ModelTiers,

    /// Generation and retry budgets
    #[serde(default)]
    pub generation: GenerationSettings,

    /// External renderer invocation
    #[serde(default)]
    pub renderer: RendererSettings,

    /// Workspace housekeeping
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Optional remote publishing
    #[serde(default)]
    pub publish: PublishSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model identifiers per quality tier, plus the cheaper model used on quota exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTiers {
    #[serde(default = "default_low_model")]
    pub low: String,
    #[serde(default = "default_medium_model")]
    pub medium: String,
    #[serde(default = "default_high_model")]
    pub high: String,
    #[serde(default = "default_fallback_model")]
    pub fallback: String,
}

fn default_low_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

fn default_medium_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_high_model() -> String {
    "gemini-2.0-pro-exp-02-05".to_string()
}

fn default_fallback_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            low: default_low_model(),
            medium: default_medium_model(),
            high: default_high_model(),
            fallback: default_fallback_model(),
        }
    }
}

impl ModelTiers {
    pub fn model_for(&self, tier: QualityTier) -> &str {
        match tier {
            QualityTier::Low => &self.low,
            QualityTier::Medium => &self.medium,
            QualityTier::High => &self.high,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("low", &self.low),
            ("medium", &self.medium),
            ("high", &self.high),
            ("fallback", &self.fallback),
        ] {
            if value.trim().is_empty() {
                return Err(format!("models.{} cannot be empty", name));
            }
        }
        Ok(())
    }
}

/// Generation call and render retry budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Total model calls per generation when the backend reports quota exhaustion
    #[serde(default = "default_three")]
    pub max_generation_attempts: usize,

    /// Pause before retrying on the fallback model (milliseconds)
    #[serde(default = "default_quota_backoff_ms")]
    pub quota_backoff_ms: u64,

    /// Render attempts per top-level request, repairs included
    #[serde(default = "default_three")]
    pub max_render_attempts: usize,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_three() -> usize {
    3
}

fn default_quota_backoff_ms() -> u64 {
    2000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_generation_attempts: default_three(),
            quota_backoff_ms: default_quota_backoff_ms(),
            max_render_attempts: default_three(),
            temperature: None,
        }
    }
}

impl GenerationSettings {
    pub fn quota_backoff(&self) -> Duration {
        Duration::from_millis(self.quota_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_generation_attempts == 0 {
            return Err("max_generation_attempts must be at least 1".to_string());
        }
        if self.max_render_attempts == 0 {
            return Err("max_render_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// External renderer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Renderer executable (looked up on PATH)
    #[serde(default = "default_program")]
    pub program: String,

    /// Kill the renderer after this many seconds
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,

    /// Logical output file name, without extension
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Extra arguments placed before the source path
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_program() -> String {
    "manim".to_string()
}

fn default_render_timeout_secs() -> u64 {
    600
}

fn default_output_name() -> String {
    "lesson".to_string()
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_render_timeout_secs(),
            output_name: default_output_name(),
            extra_args: Vec::new(),
        }
    }
}

impl RendererSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("renderer.program cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("renderer.timeout_secs must be greater than zero".to_string());
        }
        validate_output_name(&self.output_name)
    }
}

/// Output names become file names inside the output tree; no separators allowed.
pub fn validate_output_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("output name cannot be empty".to_string());
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(format!("output name '{}' must be a plain file name", name));
    }
    Ok(())
}

/// Workspace housekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Attempts per directory when clearing partial render files
    #[serde(default = "default_three")]
    pub cleanup_attempts: usize,

    /// Pause between cleanup attempts (milliseconds)
    #[serde(default = "default_cleanup_retry_delay_ms")]
    pub cleanup_retry_delay_ms: u64,
}

fn default_cleanup_retry_delay_ms() -> u64 {
    500
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            cleanup_attempts: default_three(),
            cleanup_retry_delay_ms: default_cleanup_retry_delay_ms(),
        }
    }
}

/// Remote publishing (GitHub contents API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSettings {
    /// `owner/name` of the destination repository
    #[serde(default)]
    pub repository: Option<String>,

    /// Access token with contents write permission
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_path_prefix() -> String {
    "videos".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            branch: None,
            path_prefix: default_path_prefix(),
            api_base: default_api_base(),
        }
    }
}

impl PublishSettings {
    /// Repository, falling back to `GITHUB_REPO`.
    pub fn resolve_repository(&self) -> Option<String> {
        non_empty(self.repository.clone()).or_else(|| non_empty(std::env::var("GITHUB_REPO").ok()))
    }

    /// Token, falling back to `GITHUB_TOKEN`.
    pub fn resolve_token(&self) -> Option<String> {
        non_empty(self.token.clone()).or_else(|| non_empty(std::env::var("GITHUB_TOKEN").ok()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String),
    Models(String),
    Generation(String),
    Renderer(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Models(msg) => write!(f, "Models: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Renderer(msg) => write!(f, "Renderer: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl LessonConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.models.validate() {
            errors.push(ValidationError::Models(e));
        }
        if let Err(e) = self.generation.validate() {
            errors.push(ValidationError::Generation(e));
        }
        if let Err(e) = self.renderer.validate() {
            errors.push(ValidationError::Renderer(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}
