//! lessonforge CLI Binary
//!
//! Command-line interface for generating animated lessons.

use clap::Parser;
use lessonforge::cli::{map_error, Cli, RunContext};
use lessonforge::config::ConfigLoader;
use lessonforge::logging::{init_logging, LoggingConfig};
use owo_colors::OwoColorize;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    // Initialize logging early
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("lessonforge starting");

    let context = match RunContext::new(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.session.clone(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing workspace: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{} {}", "✗".red(), map_error(&e));
            if cli.command.wants_details() {
                let diagnostic = e
                    .diagnostic()
                    .map(str::to_string)
                    .or_else(|| context.last_diagnostic());
                if let Some(diagnostic) = diagnostic {
                    eprintln!("\n{}", diagnostic);
                }
            }
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
        // a log file with no explicit destination means "write to it"
        if cli.log_output.is_none() {
            config.output = "file".to_string();
        }
    }

    config
}
