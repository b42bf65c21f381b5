//! Gauntlet Configuration System
//!
//! Provides configuration for harness invocations:
//! - Project configuration (gauntlet.toml)
//! - Global user configuration (~/.gauntlet/config.toml)
//! - Environment variable overrides (GAUNTLET_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later
//! overrides earlier):
//! 1. Global config (~/.gauntlet/config.toml)
//! 2. Project config (./gauntlet.toml)
//! 3. Environment variables (GAUNTLET_*)
//! 4. CLI flags (applied by the caller)
//!
//! The resulting `HarnessConfig` is also the `options` record of the
//! worker protocol: it serializes and ships to remote execution contexts
//! unchanged.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How cases are dispatched to execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerMode {
    /// Invoke case bodies directly on the scheduler's runtime.
    #[default]
    InProcess,
    /// One worker task owned by the runner.
    Dedicated,
    /// One worker task multiplexed between runners.
    Shared,
}

/// Harness options
///
/// Every field maps to a CLI flag of the same name; unknown provider flags
/// are carried opaquely and never interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Colorize reporter output.
    pub colors: bool,
    /// Run cases in compatibility mode.
    pub compat: bool,
    /// Collect coverage data from the execution sandbox.
    pub coverage: bool,
    /// Print the result and logs of every case as it runs.
    pub verbose: bool,
    /// Keep debug-severity log entries in case results.
    pub debug: bool,
    /// Provider module implementing the API under test.
    pub gpu_provider: Option<String>,
    /// Opaque `k=v` flags forwarded to the provider.
    pub gpu_provider_flags: Vec<String>,
    pub unroll_const_eval_loops: bool,
    pub enforce_default_limits: bool,
    pub force_fallback_adapter: bool,
    /// Mirror log lines to a websocket listener.
    pub log_to_websocket: bool,
    /// Dispatch mode for case execution.
    pub worker: WorkerMode,
    /// Maximum cases in flight at once.
    pub concurrency: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            colors: true,
            compat: false,
            coverage: false,
            verbose: false,
            debug: false,
            gpu_provider: None,
            gpu_provider_flags: Vec::new(),
            unroll_const_eval_loops: false,
            enforce_default_limits: false,
            force_fallback_adapter: false,
            log_to_websocket: false,
            worker: WorkerMode::default(),
            concurrency: 1,
        }
    }
}

pub use loader::ConfigLoader;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_quiet() {
        let config = HarnessConfig::default();
        assert!(config.colors);
        assert!(!config.verbose);
        assert_eq!(config.worker, WorkerMode::InProcess);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn serde_roundtrip() {
        let mut config = HarnessConfig::default();
        config.worker = WorkerMode::Shared;
        config.gpu_provider = Some("provider/mod".into());
        config.gpu_provider_flags = vec!["backend=vk".into()];
        let back = toml_roundtrip(&config);
        assert_eq!(back, config);
    }

    fn toml_roundtrip(config: &HarnessConfig) -> HarnessConfig {
        let text = toml::to_string(config).unwrap();
        toml::from_str(&text).unwrap()
    }

    #[test]
    fn worker_mode_kebab_case() {
        let config: HarnessConfig = toml::from_str("worker = \"in-process\"").unwrap();
        assert_eq!(config.worker, WorkerMode::InProcess);
        let config: HarnessConfig = toml::from_str("worker = \"dedicated\"").unwrap();
        assert_eq!(config.worker, WorkerMode::Dedicated);
    }
}
