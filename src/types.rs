//! Core data model: requests, tiers, presets and candidate sources.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// Entry-point class every generated scene must define. The renderer invokes it by name.
pub const SCENE_ENTRY_POINT: &str = "SceneTopic";

/// Output quality tier.
///
/// A tier drives two independent lookups: which model writes the scene
/// (see [`crate::config::ModelTiers`]) and which fidelity preset the renderer uses.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];

    /// Renderer fidelity flag.
    pub fn render_flag(self) -> &'static str {
        match self {
            QualityTier::Low => "-ql",
            QualityTier::Medium => "-qm",
            QualityTier::High => "-qh",
        }
    }

    /// Directory name fragment the renderer uses for this tier's output
    /// (`<height>p<fps>`). Owned by the external tool and may change between versions.
    pub fn resolution_marker(self) -> &'static str {
        match self {
            QualityTier::Low => "480p15",
            QualityTier::Medium => "720p30",
            QualityTier::High => "1080p60",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject area used to tailor explanations and examples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    #[default]
    General,
    Mathematics,
    ComputerScience,
    Physics,
    Chemistry,
    Biology,
    Economics,
    History,
}

impl Subject {
    pub fn display_name(self) -> &'static str {
        match self {
            Subject::General => "General",
            Subject::Mathematics => "Mathematics",
            Subject::ComputerScience => "Computer Science",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::Economics => "Economics",
            Subject::History => "History",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Narration voice character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VoicePreset {
    TeachingAssistant,
    Professor,
    Enthusiastic,
    Calm,
    Neutral,
}

impl VoicePreset {
    pub const ALL: [VoicePreset; 5] = [
        VoicePreset::TeachingAssistant,
        VoicePreset::Professor,
        VoicePreset::Enthusiastic,
        VoicePreset::Calm,
        VoicePreset::Neutral,
    ];

    pub fn key(self) -> &'static str {
        match self {
            VoicePreset::TeachingAssistant => "teaching_assistant",
            VoicePreset::Professor => "professor",
            VoicePreset::Enthusiastic => "enthusiastic",
            VoicePreset::Calm => "calm",
            VoicePreset::Neutral => "neutral",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            VoicePreset::TeachingAssistant => "Friendly, energetic teaching assistant",
            VoicePreset::Professor => "Authoritative, calm professor",
            VoicePreset::Enthusiastic => "Very cheerful and exciting",
            VoicePreset::Calm => "Soothing and relaxed",
            VoicePreset::Neutral => "Standard voice without effects",
        }
    }

    /// Whether the preset asks for any post-processing at all.
    pub fn uses_effects(self) -> bool {
        !matches!(self, VoicePreset::Neutral)
    }
}

impl fmt::Display for VoicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fresh lesson request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    topic: String,
    subject: Subject,
    quality: QualityTier,
    voice: Option<VoicePreset>,
    use_effects_chain: bool,
}

impl GenerationRequest {
    /// Build a request; the topic is trimmed and must not be empty.
    pub fn new(
        topic: impl Into<String>,
        subject: Subject,
        quality: QualityTier,
        voice: Option<VoicePreset>,
        use_effects_chain: bool,
    ) -> Result<Self, ApiError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(ApiError::InvalidRequest("Please enter a topic.".to_string()));
        }
        Ok(Self {
            topic,
            subject,
            quality,
            voice,
            use_effects_chain,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn voice(&self) -> Option<VoicePreset> {
        self.voice
    }

    pub fn use_effects_chain(&self) -> bool {
        self.use_effects_chain
    }
}

/// Generated scene program. Opaque to everything except the renderer; never assumed valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSource {
    text: String,
}

impl CandidateSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Entry point the renderer is asked to run.
    pub fn entry_point(&self) -> &'static str {
        SCENE_ENTRY_POINT
    }
}

/// Where a finished artifact lives. Exactly one location at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote(String),
}

/// A rendered lesson video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub location: ArtifactLocation,
    pub logical_filename: String,
    pub quality: QualityTier,
}

impl ArtifactHandle {
    pub fn local(path: PathBuf, quality: QualityTier) -> Self {
        let logical_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            location: ArtifactLocation::Local(path),
            logical_filename,
            quality,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            ArtifactLocation::Local(path) => Some(path),
            ArtifactLocation::Remote(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.location {
            ArtifactLocation::Remote(url) => Some(url),
            ArtifactLocation::Local(_) => None,
        }
    }

    /// The same artifact after its bytes moved to remote storage.
    pub fn into_remote(self, url: String) -> Self {
        Self {
            location: ArtifactLocation::Remote(url),
            ..self
        }
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            ArtifactLocation::Local(path) => write!(f, "{}", path.display()),
            ArtifactLocation::Remote(url) => f.write_str(url),
        }
    }
}
