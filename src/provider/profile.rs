//! Provider profile: which backend to talk to and with what credentials.

use super::{ClientFactory, ModelProvider, ModelProviderClient, ProviderFactory};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Environment variable consulted when no api_key is configured.
    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            ProviderType::Gemini => Some("GOOGLE_API_KEY"),
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Ollama => None,
        }
    }

    pub fn requires_api_key(self) -> bool {
        self.api_key_env_var().is_some()
    }
}

fn default_provider_type() -> ProviderType {
    ProviderType::Gemini
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Provider configuration (`[provider]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL override
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            api_key: None,
            endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Configured key, falling back to the backend's conventional environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.provider_type
                    .api_key_env_var()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "endpoint must start with http:// or https:// (got '{}')",
                    endpoint
                ));
            }
        }
        Ok(())
    }

    /// Resolve this profile into a concrete provider for `model`.
    pub fn to_model_provider(&self, model: &str) -> Result<ModelProvider, ApiError> {
        if model.trim().is_empty() {
            return Err(ApiError::ConfigError("Model name cannot be empty".to_string()));
        }
        let model = model.to_string();
        let base_url = self.endpoint.clone();

        let api_key = || {
            self.resolve_api_key().ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "No API key configured for {:?} provider (set provider.api_key or {})",
                    self.provider_type,
                    self.provider_type.api_key_env_var().unwrap_or("an api key"),
                ))
            })
        };

        Ok(match self.provider_type {
            ProviderType::Gemini => ModelProvider::Gemini {
                model,
                api_key: api_key()?,
                base_url,
            },
            ProviderType::OpenAI => ModelProvider::OpenAI {
                model,
                api_key: api_key()?,
                base_url,
            },
            ProviderType::Ollama => ModelProvider::Ollama { model, base_url },
        })
    }
}

impl ClientFactory for ProviderConfig {
    fn create_client(&self, model: &str) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        let provider = self.to_model_provider(model)?;
        let client = ProviderFactory::create_client(
            &provider,
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(Arc::from(client))
    }
}
