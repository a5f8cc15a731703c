//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Short, user-facing failure line. Diagnostics are never included; they are shown by
/// `lessonforge diagnostics` or `--details`.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ExhaustedRetries { .. } => format!(
            "Error: {}. Run `lessonforge diagnostics` for details.",
            e
        ),
        _ if e.is_generation_failure() => format!("Error generating code: {}", e),
        _ => format!("Error: {}", e),
    }
}
