//! Harness flags and tolerant argv handling
//!
//! The flag set is part of the external interface: an unrecognized flag is
//! logged and ignored rather than failing the invocation, so wrapper
//! scripts can pass through options meant for other harness builds.

use clap::Args;
use gauntlet_config::{HarnessConfig, WorkerMode};

/// Flags shared by `run` and `server`, mapped onto `HarnessConfig`.
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessFlags {
    /// Colorize reporter output.
    #[arg(long)]
    pub colors: bool,
    /// Run cases in compatibility mode.
    #[arg(long)]
    pub compat: bool,
    /// Collect coverage data from the execution sandbox.
    #[arg(long)]
    pub coverage: bool,
    /// Print the result and logs of every case as it runs.
    #[arg(long, short = 'v')]
    pub verbose: bool,
    /// Keep debug-severity log entries in case results.
    #[arg(long)]
    pub debug: bool,
    /// Provider module implementing the API under test.
    #[arg(long, value_name = "MODULE")]
    pub gpu_provider: Option<String>,
    /// Opaque k=v flag forwarded to the provider (repeatable).
    #[arg(long, value_name = "K=V")]
    pub gpu_provider_flag: Vec<String>,
    #[arg(long)]
    pub unroll_const_eval_loops: bool,
    #[arg(long)]
    pub enforce_default_limits: bool,
    #[arg(long)]
    pub force_fallback_adapter: bool,
    /// Mirror log lines to a websocket listener.
    #[arg(long)]
    pub log_to_websocket: bool,
    /// Dispatch mode: in-process, dedicated, or shared.
    #[arg(long, value_name = "MODE")]
    pub worker: Option<String>,
    /// Maximum cases in flight at once.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

impl HarnessFlags {
    /// Overlay these flags onto a loaded configuration.
    pub fn apply(&self, mut config: HarnessConfig) -> anyhow::Result<HarnessConfig> {
        config.colors |= self.colors;
        config.compat |= self.compat;
        config.coverage |= self.coverage;
        config.verbose |= self.verbose;
        config.debug |= self.debug;
        config.unroll_const_eval_loops |= self.unroll_const_eval_loops;
        config.enforce_default_limits |= self.enforce_default_limits;
        config.force_fallback_adapter |= self.force_fallback_adapter;
        config.log_to_websocket |= self.log_to_websocket;
        if let Some(provider) = &self.gpu_provider {
            config.gpu_provider = Some(provider.clone());
        }
        config
            .gpu_provider_flags
            .extend(self.gpu_provider_flag.iter().cloned());
        if let Some(worker) = &self.worker {
            config.worker = match worker.as_str() {
                "in-process" => WorkerMode::InProcess,
                "dedicated" => WorkerMode::Dedicated,
                "shared" => WorkerMode::Shared,
                other => anyhow::bail!("unknown worker mode `{other}`"),
            };
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        Ok(config)
    }
}

/// Every long flag the process recognizes, for the tolerant pre-scan.
const KNOWN_FLAGS: &[&str] = &[
    "colors",
    "compat",
    "coverage",
    "verbose",
    "debug",
    "gpu-provider",
    "gpu-provider-flag",
    "unroll-const-eval-loops",
    "enforce-default-limits",
    "force-fallback-adapter",
    "log-to-websocket",
    "worker",
    "concurrency",
    "remote",
    "expectations",
    "file",
    "port",
    "help",
    "version",
];

/// Drop unrecognized `--flags` from argv, logging each one.
///
/// Short flags and positionals pass through untouched; clap still rejects
/// malformed *known* usage.
pub fn drop_unknown_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .filter(|arg| {
            let Some(flag) = arg.strip_prefix("--") else {
                return true;
            };
            let name = flag.split('=').next().unwrap_or(flag);
            if name.is_empty() || KNOWN_FLAGS.contains(&name) {
                true
            } else {
                tracing::warn!(flag = %arg, "unrecognized flag, ignoring");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn known_flags_survive() {
        let out = drop_unknown_flags(argv(&[
            "gauntlet",
            "run",
            "--verbose",
            "--worker=dedicated",
            "demo:*",
        ]));
        assert_eq!(
            out,
            argv(&["gauntlet", "run", "--verbose", "--worker=dedicated", "demo:*"])
        );
    }

    #[test]
    fn unknown_flags_dropped() {
        let out = drop_unknown_flags(argv(&[
            "gauntlet",
            "run",
            "--frobnicate",
            "--colors",
            "demo:*",
        ]));
        assert_eq!(out, argv(&["gauntlet", "run", "--colors", "demo:*"]));
    }

    #[test]
    fn flag_overlay() {
        let flags = HarnessFlags {
            debug: true,
            worker: Some("shared".into()),
            gpu_provider_flag: vec!["backend=gl".into()],
            ..Default::default()
        };
        let config = flags.apply(HarnessConfig::default()).unwrap();
        assert!(config.debug);
        assert_eq!(config.worker, WorkerMode::Shared);
        assert_eq!(config.gpu_provider_flags, vec!["backend=gl".to_string()]);
    }

    #[test]
    fn bad_worker_mode_is_an_error() {
        let flags = HarnessFlags {
            worker: Some("blimp".into()),
            ..Default::default()
        };
        assert!(flags.apply(HarnessConfig::default()).is_err());
    }
}
