//! Config loading facade. Precedence, lowest to highest:
//! defaults, global file, workspace files, environment.
//! An explicit file passed to [`ConfigLoader::load_from_file`] replaces both file layers.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::LessonConfig;
use config::{ConfigError, File};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<LessonConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(merge_policy::environment_source())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from an explicit file; environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<LessonConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(merge_policy::environment_source())
            .build()?
            .try_deserialize()
    }
}
