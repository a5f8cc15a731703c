//! Per-session lesson state: the current source and artifact, and the last failure
//! diagnostic. Persisted as JSON next to the session's workspace files.

use crate::error::ApiError;
use crate::orchestrator::LessonOutput;
use crate::types::{
    ArtifactHandle, CandidateSource, GenerationRequest, QualityTier, Subject, VoicePreset,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSession {
    pub session_id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subject: Subject,
    #[serde(default)]
    pub quality: QualityTier,
    #[serde(default)]
    pub voice: Option<VoicePreset>,
    #[serde(default)]
    pub current_source: Option<CandidateSource>,
    #[serde(default)]
    pub current_artifact: Option<ArtifactHandle>,
    #[serde(default)]
    pub last_diagnostic: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LessonSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            topic: None,
            subject: Subject::default(),
            quality: QualityTier::default(),
            voice: None,
            current_source: None,
            current_artifact: None,
            last_diagnostic: None,
            updated_at: Utc::now(),
        }
    }

    fn apply_request(&mut self, request: &GenerationRequest) {
        self.topic = Some(request.topic().to_string());
        self.subject = request.subject();
        self.quality = request.quality();
        self.voice = request.voice();
        self.updated_at = Utc::now();
    }

    /// Make `output` the current lesson and remember the request that produced it, so
    /// feedback runs reuse its topic. Returns the previous local artifact when it lives
    /// at a different path and should be discarded.
    pub fn record_success(
        &mut self,
        request: &GenerationRequest,
        output: LessonOutput,
    ) -> Option<PathBuf> {
        let stale = self
            .current_artifact
            .take()
            .and_then(|previous| previous.local_path().map(Path::to_path_buf))
            .filter(|previous| Some(previous.as_path()) != output.artifact.local_path());

        self.apply_request(request);
        self.quality = output.artifact.quality;
        self.current_source = Some(output.source);
        self.current_artifact = Some(output.artifact);
        self.last_diagnostic = None;
        self.updated_at = Utc::now();
        stale
    }

    /// A failed run leaves the current lesson and its request in place and stores only
    /// the diagnostic.
    pub fn record_failure(&mut self, diagnostic: Option<String>) {
        if diagnostic.is_some() {
            self.last_diagnostic = diagnostic;
        }
        self.updated_at = Utc::now();
    }

    pub fn set_artifact(&mut self, artifact: ArtifactHandle) {
        self.current_artifact = Some(artifact);
        self.updated_at = Utc::now();
    }

    /// Source and topic a feedback run starts from.
    pub fn regeneration_base(&self) -> Result<(&CandidateSource, &str), ApiError> {
        match (&self.current_source, &self.topic) {
            (Some(source), Some(topic)) => Ok((source, topic.as_str())),
            _ => Err(ApiError::InvalidRequest(
                "no lesson to regenerate".to_string(),
            )),
        }
    }
}

/// JSON file store for one session.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the session, or a fresh one when nothing has been saved yet.
    pub fn load(&self, session_id: &str) -> Result<LessonSession, ApiError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let session: LessonSession = serde_json::from_str(&contents)?;
                Ok(session)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(session_id, "No saved session, starting fresh");
                Ok(LessonSession::new(session_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write atomically: temp file in the same directory, then rename.
    pub fn save(&self, session: &LessonSession) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply a successful run and discard the artifact it replaced.
    pub fn commit_success(
        &self,
        session: &mut LessonSession,
        request: &GenerationRequest,
        output: LessonOutput,
    ) -> Result<(), ApiError> {
        if let Some(stale) = session.record_success(request, output) {
            match fs::remove_file(&stale) {
                Ok(()) => debug!(path = %stale.display(), "Removed replaced artifact"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %stale.display(), error = %e, "Could not remove replaced artifact")
                }
            }
        }
        self.save(session)
    }
}
