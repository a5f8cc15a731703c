//! CLI presentation: text formatters per command.

use crate::session::LessonSession;
use crate::types::{ArtifactHandle, VoicePreset};
use crate::workspace::CleanupReport;
use owo_colors::OwoColorize;

fn title(text: &str) -> String {
    format!("{}", text.bold().underline())
}

pub fn format_lesson_ready(artifact: &ArtifactHandle, render_attempts: usize) -> String {
    let location = match artifact.url() {
        Some(url) => format!("Published: {}", url),
        None => format!("Video: {}", artifact),
    };
    let attempts = if render_attempts == 1 {
        "1 render attempt".to_string()
    } else {
        format!("{} render attempts", render_attempts)
    };
    format!(
        "{} {}\n  {}\n  Quality: {} ({})",
        "✓".green(),
        "Lesson ready".bold(),
        location,
        artifact.quality,
        attempts
    )
}

pub fn format_diagnostic(session: &LessonSession) -> String {
    match &session.last_diagnostic {
        Some(diagnostic) => format!("{}\n{}", title("Last failure diagnostic"), diagnostic),
        None => "No failure diagnostic recorded for this session.".to_string(),
    }
}

pub fn format_cleanup_report(report: &CleanupReport) -> String {
    if report.removed.is_empty() && report.failed.is_empty() {
        return "Nothing to clean.".to_string();
    }
    let mut out = format!("Removed {} item(s)", report.removed.len());
    for path in &report.removed {
        out.push_str(&format!("\n  - {}", path.display()));
    }
    if !report.failed.is_empty() {
        out.push_str(&format!(
            "\n{} Could not remove {} item(s):",
            "✗".red(),
            report.failed.len()
        ));
        for path in &report.failed {
            out.push_str(&format!("\n  - {}", path.display()));
        }
    }
    out
}

pub fn format_presets(effects_available: bool) -> String {
    let mut out = title("Voice presets");
    for preset in VoicePreset::ALL {
        out.push_str(&format!("\n  {:<20} {}", preset.key(), preset.description()));
    }
    let status = if effects_available {
        format!("{} available (sox)", "✓".green())
    } else {
        format!("{} unavailable (install sox to enable)", "✗".yellow())
    };
    out.push_str(&format!("\n\nAudio effects chain: {}", status));
    out
}
