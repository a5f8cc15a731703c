//! Repair (diagnostic-driven) and regeneration (feedback-driven) of candidate source.

use crate::error::ApiError;
use crate::generator::CodeGenerator;
use crate::prompt::PromptSpec;
use crate::types::{CandidateSource, QualityTier, Subject};
use std::sync::Arc;
use tracing::debug;

/// Asks the generator to fix source the renderer rejected.
#[derive(Clone)]
pub struct Repairer {
    generator: Arc<CodeGenerator>,
}

impl Repairer {
    pub fn new(generator: Arc<CodeGenerator>) -> Self {
        Self { generator }
    }

    pub async fn repair(
        &self,
        source: &CandidateSource,
        diagnostic: &str,
        topic: &str,
        tier: QualityTier,
    ) -> Result<CandidateSource, ApiError> {
        debug!(topic, diagnostic_len = diagnostic.len(), "Requesting repair");
        let spec = PromptSpec::repair(source.text(), diagnostic, topic, tier);
        self.generator.produce(&spec).await
    }
}

/// Asks the generator to revise an accepted lesson according to viewer feedback.
#[derive(Clone)]
pub struct Regenerator {
    generator: Arc<CodeGenerator>,
}

impl Regenerator {
    pub fn new(generator: Arc<CodeGenerator>) -> Self {
        Self { generator }
    }

    pub async fn regenerate(
        &self,
        source: &CandidateSource,
        feedback: &str,
        topic: &str,
        subject: Subject,
        tier: QualityTier,
    ) -> Result<CandidateSource, ApiError> {
        if feedback.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Feedback cannot be empty".to_string(),
            ));
        }
        debug!(topic, "Requesting feedback revision");
        let spec = PromptSpec::feedback(source.text(), feedback, topic, subject, tier);
        self.generator.produce(&spec).await
    }
}
