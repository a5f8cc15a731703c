//! Command-name contract used for logging.

use crate::cli::parse::Commands;

/// Stable command name (e.g. "generate", "diagnostics").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { .. } => "generate",
        Commands::Regenerate { .. } => "regenerate",
        Commands::Diagnostics => "diagnostics",
        Commands::Clean => "clean",
        Commands::Presets => "presets",
    }
}

impl Commands {
    /// Whether the user asked for the full diagnostic on failure.
    pub fn wants_details(&self) -> bool {
        match self {
            Commands::Generate { details, .. } | Commands::Regenerate { details, .. } => *details,
            _ => false,
        }
    }
}
