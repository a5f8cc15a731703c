//! lessonforge: topic in, rendered lesson out.
//!
//! A bounded generate, render, diagnose, repair loop. A generative model writes an
//! animation scene program, an external renderer turns it into a video, and render
//! failures are fed back to the model for a corrected program until the lesson renders
//! or the attempt budget runs out.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod locator;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod publish;
pub mod render;
pub mod repair;
pub mod session;
pub mod types;
pub mod workspace;

pub use error::ApiError;
pub use orchestrator::{LessonOutput, LoopReport, LoopState, OrchestrationLoop};
pub use types::{
    ArtifactHandle, ArtifactLocation, CandidateSource, GenerationRequest, QualityTier, Subject,
    VoicePreset,
};
