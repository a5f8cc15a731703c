//! Session-scoped scratch space for rendering.
//!
//! Each session owns one source-file slot and one output tree under
//! `<root>/.lessonforge/sessions/<session_id>/`. Two sessions never share paths, so
//! concurrent sessions are safe; two renders within one session are not.

use crate::config::WorkspaceSettings;
use crate::error::ApiError;
use crate::types::CandidateSource;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory name the renderer uses for per-animation partial files.
pub const TRANSIENT_DIR_NAME: &str = "partial_movie_files";

/// Bytecode cache directories left behind by the interpreter that runs the scene.
pub const BYTECODE_CACHE_DIR_NAME: &str = "__pycache__";

const STATE_DIR_NAME: &str = ".lessonforge";
const SOURCE_FILE_NAME: &str = "scene_topic.py";
const OUTPUT_DIR_NAME: &str = "media";
const SESSION_FILE_NAME: &str = "session.json";

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Retry policy for removing directories the renderer may still hold open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub attempts: usize,
    pub retry_delay: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from(&WorkspaceSettings::default())
    }
}

impl From<&WorkspaceSettings> for CleanupPolicy {
    fn from(settings: &WorkspaceSettings) -> Self {
        Self {
            attempts: settings.cleanup_attempts.max(1),
            retry_delay: Duration::from_millis(settings.cleanup_retry_delay_ms),
        }
    }
}

/// What a cleanup pass did. Cleanup never fails; paths it could not remove are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    fn merge(&mut self, other: CleanupReport) {
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }
}

/// Workspace handle for one session.
#[derive(Debug, Clone)]
pub struct Workspace {
    session_id: String,
    session_dir: PathBuf,
    cleanup: CleanupPolicy,
}

impl Workspace {
    /// Open (and create if needed) the session directory under `root`.
    pub fn open(
        root: impl Into<PathBuf>,
        session_id: &str,
        cleanup: CleanupPolicy,
    ) -> Result<Self, ApiError> {
        validate_session_id(session_id)?;
        let root: PathBuf = root.into();
        // renderer cwd is the session dir, so every path handed to it must be absolute
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        let session_dir = root
            .join(STATE_DIR_NAME)
            .join("sessions")
            .join(session_id);
        fs::create_dir_all(&session_dir)?;

        Ok(Self {
            session_id: session_id.to_string(),
            session_dir,
            cleanup,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// The single temporary source slot.
    pub fn source_path(&self) -> PathBuf {
        self.session_dir.join(SOURCE_FILE_NAME)
    }

    /// Root of the renderer's output tree.
    pub fn output_root(&self) -> PathBuf {
        self.session_dir.join(OUTPUT_DIR_NAME)
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_dir.join(SESSION_FILE_NAME)
    }

    /// Overwrite the source slot with `source`.
    pub fn write_source(&self, source: &CandidateSource) -> Result<PathBuf, ApiError> {
        let path = self.source_path();
        fs::create_dir_all(&self.session_dir)?;
        fs::write(&path, source.text())?;
        Ok(path)
    }

    /// Remove renderer partial-file directories beneath the output tree.
    ///
    /// Tolerates locked or read-only entries: each directory gets `attempts` tries, with
    /// write permission restored in between. Failures are logged, never returned.
    pub async fn cleanup_transient(&self) -> CleanupReport {
        let output_root = self.output_root();
        if !output_root.exists() {
            return CleanupReport::default();
        }

        let targets = find_named_dirs(&output_root, TRANSIENT_DIR_NAME);
        let report = self.remove_all(targets).await;
        debug!(
            session_id = %self.session_id,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Transient render files cleaned"
        );
        report
    }

    /// Remove the source slot, bytecode caches, and transient render files.
    /// Safe to call when none of them exist.
    pub async fn cleanup_all(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let source = self.source_path();
        match fs::remove_file(&source) {
            Ok(()) => report.removed.push(source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Could not remove temporary source");
                report.failed.push(source);
            }
        }

        if self.session_dir.exists() {
            let caches = find_named_dirs(&self.session_dir, BYTECODE_CACHE_DIR_NAME);
            report.merge(self.remove_all(caches).await);
        }
        report.merge(self.cleanup_transient().await);
        report
    }

    async fn remove_all(&self, targets: Vec<PathBuf>) -> CleanupReport {
        let mut report = CleanupReport::default();
        for dir in targets {
            if remove_with_retry(&dir, self.cleanup, |d| fs::remove_dir_all(d)).await {
                report.removed.push(dir);
            } else {
                report.failed.push(dir);
            }
        }
        report
    }
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "Invalid session id '{}': use 1-64 letters, digits, '-' or '_'",
            session_id
        )))
    }
}

/// Directories named `name` under `root`, without descending into matches.
fn find_named_dirs(root: &Path, name: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry during cleanup scan");
                continue;
            }
        };
        if entry.file_type().is_dir() && entry.depth() > 0 && entry.file_name() == name {
            found.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    found
}

async fn remove_with_retry<F>(dir: &Path, policy: CleanupPolicy, mut remove: F) -> bool
where
    F: FnMut(&Path) -> io::Result<()>,
{
    for attempt in 1..=policy.attempts {
        match remove(dir) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => {
                make_tree_writable(dir);
                if attempt < policy.attempts {
                    debug!(
                        path = %dir.display(),
                        attempt,
                        error = %e,
                        "Retrying directory removal"
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                } else {
                    warn!(
                        path = %dir.display(),
                        attempts = policy.attempts,
                        error = %e,
                        "Giving up on directory removal"
                    );
                }
            }
        }
    }
    false
}

fn make_tree_writable(dir: &Path) {
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if let Ok(metadata) = entry.metadata() {
            if let Err(e) = make_writable(entry.path(), &metadata) {
                debug!(path = %entry.path().display(), error = %e, "Could not clear read-only bit");
            }
        }
    }
}

#[cfg(unix)]
fn make_writable(path: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = metadata.permissions();
    let extra = if metadata.is_dir() { 0o700 } else { 0o600 };
    permissions.set_mode(permissions.mode() | extra);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_writable(path: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    let mut permissions = metadata.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}
