//! Error types for the lesson pipeline.

use thiserror::Error;

/// Pipeline-wide error type.
///
/// Render failures are not errors: they travel as [`crate::render::RenderOutcome::Failure`]
/// values so the orchestration loop can repair and retry them. Everything here is terminal
/// for the call that produced it, with the single exception of `ProviderRateLimit`, which
/// the code generator retries against its fallback model.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// The render budget ran out. The diagnostic is kept off the display message and is
    /// available through [`ApiError::diagnostic`].
    #[error("Rendering failed after {attempts} attempt(s): {reason}")]
    ExhaustedRetries {
        attempts: usize,
        reason: String,
        last_diagnostic: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Detailed diagnostic text attached to a terminal failure, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ApiError::ExhaustedRetries {
                last_diagnostic, ..
            } => last_diagnostic.as_deref(),
            _ => None,
        }
    }

    /// Transient capacity errors; the only kind the code generator retries.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, ApiError::ProviderRateLimit(_))
    }

    /// Whether this error came out of the generation step (model backend or empty output).
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            ApiError::ProviderError(_)
                | ApiError::ProviderRequestFailed(_)
                | ApiError::ProviderAuthFailed(_)
                | ApiError::ProviderRateLimit(_)
                | ApiError::ProviderModelNotFound(_)
                | ApiError::GenerationFailed(_)
        )
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ConfigError(format!("Invalid JSON: {}", err))
    }
}
