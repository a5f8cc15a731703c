//! CLI domain: parse, route, help, output, and presentation only.
//! Route handlers call into the pipeline; formatting lives in presentation.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_cleanup_report, format_diagnostic, format_lesson_ready, format_presets,
};
pub use route::RunContext;
