//! Finds the rendered artifact inside the renderer's output tree.

use crate::types::QualityTier;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ARTIFACT_EXTENSION: &str = "mp4";

pub struct ArtifactLocator;

impl ArtifactLocator {
    /// Search `root` recursively for `expected_name` (".mp4" appended when it has no
    /// extension). A match under the tier's resolution directory wins; otherwise the first
    /// match in file-name order. `None` when the tree is missing or nothing matches.
    pub fn locate(root: &Path, expected_name: &str, tier: QualityTier) -> Option<PathBuf> {
        if !root.is_dir() {
            return None;
        }

        let file_name = artifact_file_name(expected_name);
        let marker = tier.resolution_marker();
        let mut first_match = None;

        let matches = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file() && entry.file_name() == file_name.as_str()
            });

        for entry in matches {
            let under_marker = entry
                .path()
                .parent()
                .and_then(|dir| dir.strip_prefix(root).ok())
                .map(|dir| dir.to_string_lossy().contains(marker))
                .unwrap_or(false);
            if under_marker {
                return Some(entry.into_path());
            }
            if first_match.is_none() {
                first_match = Some(entry.into_path());
            }
        }

        first_match
    }
}

/// File name the renderer produces for a logical output name.
pub fn artifact_file_name(expected_name: &str) -> String {
    if Path::new(expected_name).extension().is_some() {
        expected_name.to_string()
    } else {
        format!("{}.{}", expected_name, ARTIFACT_EXTENSION)
    }
}
