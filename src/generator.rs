//! Code generator: turns a prompt into candidate scene source.
//!
//! Picks the model for the prompt's tier, swaps to the fallback model when the backend
//! reports quota exhaustion, and fails fast on anything else.

use crate::config::{GenerationSettings, ModelTiers};
use crate::error::ApiError;
use crate::prompt::PromptSpec;
use crate::provider::{ClientFactory, CompletionOptions};
use crate::types::{CandidateSource, QualityTier};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub struct CodeGenerator {
    factory: Arc<dyn ClientFactory>,
    models: ModelTiers,
    settings: GenerationSettings,
}

impl CodeGenerator {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        models: ModelTiers,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            factory,
            models,
            settings,
        }
    }

    /// Model identifier used for `tier` before any fallback.
    pub fn model_for(&self, tier: QualityTier) -> &str {
        self.models.model_for(tier)
    }

    /// Produce candidate source for `spec`.
    ///
    /// Makes at most `max_generation_attempts` model calls. A quota signal switches to
    /// the fallback model and waits `quota_backoff` before resending the same prompt.
    pub async fn produce(&self, spec: &PromptSpec) -> Result<CandidateSource, ApiError> {
        let max_attempts = self.settings.max_generation_attempts.max(1);
        let options = CompletionOptions {
            temperature: self.settings.temperature.or(Some(1.0)),
            ..CompletionOptions::default()
        };
        let mut model = self.models.model_for(spec.tier).to_string();

        for attempt in 1..=max_attempts {
            let client = self.factory.create_client(&model)?;
            debug!(model = %model, tier = %spec.tier, attempt, "Requesting scene code");

            match client.complete(spec.messages.clone(), options.clone()).await {
                Ok(response) => {
                    let code = strip_code_fences(&response.content);
                    if code.is_empty() {
                        return Err(ApiError::GenerationFailed(format!(
                            "Model {} returned no code",
                            model
                        )));
                    }
                    info!(
                        model = %response.model,
                        attempt,
                        completion_tokens = response.usage.completion_tokens,
                        "Scene code generated"
                    );
                    return Ok(CandidateSource::new(code));
                }
                Err(err) if err.is_quota_exceeded() => {
                    if attempt == max_attempts {
                        warn!(model = %model, attempt, "Quota exceeded on final attempt");
                        return Err(ApiError::GenerationFailed(format!(
                            "Failed to generate code after {} attempts: {}",
                            attempt, err
                        )));
                    }
                    warn!(
                        model = %model,
                        fallback = %self.models.fallback,
                        attempt,
                        "Quota exceeded, switching to fallback model"
                    );
                    model = self.models.fallback.clone();
                    sleep(self.settings.quota_backoff()).await;
                }
                Err(err) => {
                    warn!(model = %model, attempt, error = %err, "Generation failed");
                    return Err(err);
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        Err(ApiError::GenerationFailed(
            "No generation attempts were made".to_string(),
        ))
    }
}

/// Remove code-fence delimiters and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}
