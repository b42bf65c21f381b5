//! Configuration Loader
//!
//! Loads configuration from multiple sources and merges them with proper
//! precedence: global config, then project config, then GAUNTLET_*
//! environment variables. CLI flags are applied by the caller on top.

use crate::{ConfigError, ConfigResult, HarnessConfig, WorkerMode};
use std::path::{Path, PathBuf};

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "gauntlet.toml";

/// Configuration loader
pub struct ConfigLoader {
    /// Override for the global config path, used by tests.
    global_config_path: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    pub fn with_global_path(mut self, path: PathBuf) -> Self {
        self.global_config_path = Some(path);
        self
    }

    /// Load configuration starting from the given directory.
    ///
    /// Missing files are fine; malformed files are not.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<HarnessConfig> {
        let mut config = self
            .global_path()
            .filter(|p| p.exists())
            .map(|p| load_file(&p))
            .transpose()?
            .unwrap_or_default();

        let project_path = start_dir.join(PROJECT_CONFIG_FILE);
        if project_path.exists() {
            config = load_file(&project_path)?;
        }

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn global_path(&self) -> Option<PathBuf> {
        self.global_config_path
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".gauntlet").join("config.toml")))
    }
}

fn load_file(path: &Path) -> ConfigResult<HarnessConfig> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|error| ConfigError::TomlParseError {
        file: path.to_path_buf(),
        error,
    })
}

/// Apply `GAUNTLET_*` overrides from an environment lookup.
fn apply_env_overrides(
    config: &mut HarnessConfig,
    env: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let truthy = |value: &str| matches!(value, "1" | "true" | "yes");

    for (key, field) in [
        ("GAUNTLET_VERBOSE", &mut config.verbose as &mut bool),
        ("GAUNTLET_DEBUG", &mut config.debug),
        ("GAUNTLET_COMPAT", &mut config.compat),
        ("GAUNTLET_COVERAGE", &mut config.coverage),
    ] {
        if let Some(value) = env(key) {
            *field = truthy(&value);
        }
    }
    if env("NO_COLOR").is_some() {
        config.colors = false;
    }
    if let Some(value) = env("GAUNTLET_WORKER") {
        config.worker = match value.as_str() {
            "in-process" => WorkerMode::InProcess,
            "dedicated" => WorkerMode::Dedicated,
            "shared" => WorkerMode::Shared,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "GAUNTLET_WORKER".into(),
                    reason: format!("unknown worker mode `{other}`"),
                })
            }
        };
    }
    if let Some(value) = env("GAUNTLET_CONCURRENCY") {
        config.concurrency = value.parse().map_err(|_| ConfigError::InvalidValue {
            field: "GAUNTLET_CONCURRENCY".into(),
            reason: format!("`{value}` is not a number"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_global_path(dir.path().join("nope.toml"))
            .load_from_directory(dir.path())
            .unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn project_file_overrides_global() {
        let dir = tempdir().unwrap();
        let global = dir.path().join("global.toml");
        fs::write(&global, "verbose = true\nconcurrency = 8\n").unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "concurrency = 2\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_global_path(global)
            .load_from_directory(dir.path())
            .unwrap();
        // The project file wins wholesale where present.
        assert_eq!(config.concurrency, 2);
        assert!(!config.verbose);
    }

    #[test]
    fn malformed_project_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "worker = [1]").unwrap();
        let result = ConfigLoader::new()
            .with_global_path(dir.path().join("nope.toml"))
            .load_from_directory(dir.path());
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = HarnessConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            "GAUNTLET_DEBUG" => Some("1".into()),
            "GAUNTLET_WORKER" => Some("shared".into()),
            "GAUNTLET_CONCURRENCY" => Some("4".into()),
            _ => None,
        })
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.worker, WorkerMode::Shared);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut config = HarnessConfig::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == "GAUNTLET_WORKER").then(|| "zeppelin".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
