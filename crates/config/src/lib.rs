//! Configuration loading, validation, env substitution, and templating.
//!
//! Config files: `conflux.toml`, `conflux.yaml`, or `conflux.json`.
//! Searched in `./` then `~/.config/conflux/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, save_config},
    schema::{BreakerConfig, CacheConfig, OrchestratorConfig, RateLimitConfig, ServerConfig},
    template::default_config_template,
    validate::{validate, Diagnostic, Severity, ValidationResult},
};
