use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::OrchestratorConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["conflux.toml", "conflux.yaml", "conflux.yml", "conflux.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<OrchestratorConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./conflux.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/conflux/conflux.{toml,yaml,yml,json}` (user-global)
///
/// Returns `OrchestratorConfig::default()` if no config file is found.
pub fn discover_and_load() -> OrchestratorConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    OrchestratorConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "conflux") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/conflux/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "conflux").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conflux.toml")
}

/// Serialize `config` to TOML and write it to the user-global config path.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &OrchestratorConfig) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(&path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<OrchestratorConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_toml_overriding_only_named_fields() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "request_deadline_seconds = 30").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.request_deadline_seconds, 30);
        assert_eq!(config.max_concurrent_legs_per_request, 3);
    }

    #[test]
    fn parses_yaml() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "reasoner_max_iterations: 5").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.reasoner_max_iterations, 5);
    }

    #[test]
    fn substitutes_env_vars_before_parsing() {
        std::env::set_var("CONFLUX_TEST_PORT", "9999");
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[server]\nport = \"${{CONFLUX_TEST_PORT}}\"").unwrap();
        let raw = std::fs::read_to_string(file.path()).unwrap();
        let substituted = substitute_env(&raw);
        assert!(substituted.contains("9999"));
        std::env::remove_var("CONFLUX_TEST_PORT");
    }

    #[test]
    fn missing_file_returns_an_error() {
        assert!(load_config(Path::new("/nonexistent/conflux.toml")).is_err());
    }
}
