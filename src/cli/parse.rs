//! CLI parse: clap types for lessonforge. No behavior; definitions only.

use crate::types::{QualityTier, Subject, VoicePreset};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lessonforge - turn a topic into a rendered animated lesson
#[derive(Parser)]
#[command(name = "lessonforge")]
#[command(about = "Generate, render and repair animated lesson videos from a topic")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Session id; sessions keep separate sources, outputs and history
    #[arg(long, default_value = crate::workspace::DEFAULT_SESSION_ID)]
    pub session: String,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate and render a lesson for a topic
    Generate {
        /// What the lesson should explain
        topic: String,

        #[arg(long, value_enum, default_value_t = Subject::General)]
        subject: Subject,

        #[arg(long, value_enum, default_value_t = QualityTier::Medium)]
        quality: QualityTier,

        /// Narrate with a voice preset
        #[arg(long, value_enum)]
        voice: Option<VoicePreset>,

        /// Skip the audio effects chain even when available
        #[arg(long)]
        no_effects: bool,

        /// Upload the finished video and remove the local copy
        #[arg(long)]
        publish: bool,

        /// Output file name, without extension (default: renderer.output_name)
        #[arg(long)]
        output_name: Option<String>,

        /// Print the full diagnostic on failure
        #[arg(long)]
        details: bool,
    },
    /// Revise the current lesson according to feedback
    Regenerate {
        /// What to change about the current lesson
        #[arg(long)]
        feedback: String,

        /// Quality tier (default: the current lesson's)
        #[arg(long, value_enum)]
        quality: Option<QualityTier>,

        #[arg(long, value_enum)]
        voice: Option<VoicePreset>,

        #[arg(long)]
        publish: bool,

        #[arg(long)]
        details: bool,
    },
    /// Show the last failure diagnostic
    Diagnostics,
    /// Remove temporary sources, caches and partial render files
    Clean,
    /// List voice presets and whether the effects chain is available
    Presets,
}
