//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix for environment overrides, e.g. `LESSONFORGE__RENDERER__TIMEOUT_SECS=900`.
pub const ENV_PREFIX: &str = "LESSONFORGE";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("provider.provider_type", "gemini")?
        .set_default("renderer.program", "manim")?
        .set_default("renderer.output_name", "lesson")?
        .set_default("generation.max_render_attempts", 3)?
        .set_default("generation.max_generation_attempts", 3)
}

/// Environment variables are the highest-precedence layer.
pub fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
