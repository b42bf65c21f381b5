use anyhow::Result;
use clap::{Parser, Subcommand};
use gauntlet_cli::args::{drop_unknown_flags, HarnessFlags};
use gauntlet_cli::reporter::RunReporter;
use gauntlet_cli::{server, suites};
use gauntlet_config::{ConfigLoader, HarnessConfig, WorkerMode};
use gauntlet_log::{Expectation, QueryExpectation};
use gauntlet_query::parse_query;
use gauntlet_run::{
    CaseRunner, DedicatedWorkerRunner, InProcessRunner, RemoteRunner, Scheduler, SharedWorker,
};
use gauntlet_tree::{
    generate_minimal_query_list, load_tree, parse_expectation_lines, MemoizedLoader,
    StaticSuiteLoader,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Gauntlet conformance-test harness.
///
/// Identifies cases with hierarchical queries, expands declarative
/// parameter spaces into concrete cases, and schedules execution across
/// pluggable runners.
///
/// EXAMPLES:
///     gauntlet run 'demo:*'                 Run the whole demo suite
///     gauntlet run 'demo:arith:add:*' -v    Run one test, verbose
///     gauntlet list 'demo:*'                Print every case name
///     gauntlet server --port 8080           Serve the HTTP RPC interface
///
/// ENVIRONMENT VARIABLES:
///     GAUNTLET_WORKER       Default dispatch mode (in-process|dedicated|shared)
///     GAUNTLET_CONCURRENCY  Default cases in flight
///     NO_COLOR              Disable colored output
#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every case matching the given queries
    ///
    /// EXAMPLES:
    ///     gauntlet run 'demo:*'
    ///     gauntlet run 'demo:arith:*' --worker dedicated
    ///     gauntlet run 'demo:*' --remote http://localhost:8080
    #[command(visible_alias = "r")]
    Run {
        /// Query strings selecting the cases to run
        #[arg(required = true)]
        queries: Vec<String>,
        /// Expectations file: whole-subtree queries expected to fail
        #[arg(long, value_name = "FILE")]
        expectations: Option<PathBuf>,
        /// Dispatch cases to a remote harness at this base URL
        #[arg(long, value_name = "URL")]
        remote: Option<String>,
        #[command(flatten)]
        flags: HarnessFlags,
    },

    /// Print the name of every case matching a query
    #[command(visible_alias = "ls")]
    List {
        /// Query string selecting the cases to list
        query: String,
        #[command(flatten)]
        flags: HarnessFlags,
    },

    /// Print the minimal covering query list for an expectations file
    ///
    /// Every file keeps at least one query, and every expectation line
    /// appears verbatim so it can carry its own classification.
    Expectations {
        /// Root query defining the corpus
        query: String,
        /// Expectations file, one whole-subtree query per line
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        flags: HarnessFlags,
    },

    /// Serve the HTTP RPC interface (/load, /run, /terminate)
    Server {
        /// Port to bind; 0 picks an ephemeral port
        #[arg(long, default_value_t = 0)]
        port: u16,
        #[command(flatten)]
        flags: HarnessFlags,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(flags: &HarnessFlags) -> Result<HarnessConfig> {
    let base = ConfigLoader::new().load_from_directory(&std::env::current_dir()?)?;
    flags.apply(base)
}

fn demo() -> Arc<MemoizedLoader<StaticSuiteLoader>> {
    Arc::new(MemoizedLoader::new(suites::demo_loader()))
}

/// Build the configured runner; a shared worker is returned alongside so
/// the caller can tear it down deterministically.
fn make_runner(
    loader: &Arc<MemoizedLoader<StaticSuiteLoader>>,
    config: &HarnessConfig,
    remote: Option<&str>,
) -> (Arc<dyn CaseRunner>, Option<SharedWorker>) {
    if let Some(base_url) = remote {
        return (Arc::new(RemoteRunner::new(base_url)), None);
    }
    match config.worker {
        WorkerMode::InProcess => (
            Arc::new(InProcessRunner::new(Arc::clone(loader), config.clone())),
            None,
        ),
        WorkerMode::Dedicated => (
            Arc::new(DedicatedWorkerRunner::new(
                Arc::clone(loader),
                config.clone(),
            )),
            None,
        ),
        WorkerMode::Shared => {
            let shared = SharedWorker::new(Arc::clone(loader), config.clone());
            (Arc::new(shared.runner()), Some(shared))
        }
    }
}

fn read_expectations(path: &PathBuf) -> Result<Vec<QueryExpectation>> {
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let parsed = parse_expectation_lines(&lines)?;
    Ok(parsed
        .into_iter()
        .map(|expectation| QueryExpectation {
            query: expectation.line,
            expectation: Expectation::Fail,
        })
        .collect())
}

async fn cmd_run(
    queries: Vec<String>,
    expectations: Option<PathBuf>,
    remote: Option<String>,
    flags: HarnessFlags,
) -> Result<bool> {
    let config = load_config(&flags)?;
    let loader = demo();
    let (runner, shared_worker) = make_runner(&loader, &config, remote.as_deref());
    let scheduler =
        Scheduler::new(Arc::clone(&loader), runner).with_concurrency(config.concurrency);

    let expectations = match &expectations {
        Some(path) => read_expectations(path)?,
        None => vec![],
    };

    let reporter = RunReporter::new(config.verbose).with_no_color(!config.colors);
    let mut all_passed = true;
    for query_text in &queries {
        let query = parse_query(query_text)?;
        let summary = scheduler.run_query(&query, &expectations).await?;
        reporter.report(&summary);
        all_passed &= summary.all_passed();
    }
    scheduler.shutdown().await;
    if let Some(shared) = shared_worker {
        shared.shutdown().await;
    }
    Ok(all_passed)
}

async fn cmd_list(query: String, flags: HarnessFlags) -> Result<()> {
    let _config = load_config(&flags)?;
    let loader = demo();
    let tree = load_tree(loader.as_ref(), &parse_query(&query)?).await?;
    for case in tree.leaves() {
        println!("{}", case.query);
    }
    Ok(())
}

async fn cmd_expectations(query: String, file: PathBuf, flags: HarnessFlags) -> Result<()> {
    let _config = load_config(&flags)?;
    let loader = demo();
    let tree = load_tree(loader.as_ref(), &parse_query(&query)?).await?;
    let lines: Vec<String> = std::fs::read_to_string(&file)?
        .lines()
        .map(str::to_string)
        .collect();
    for line in generate_minimal_query_list(&tree, &lines)? {
        println!("{line}");
    }
    Ok(())
}

async fn cmd_server(port: u16, flags: HarnessFlags) -> Result<()> {
    let config = load_config(&flags)?;
    server::serve(demo(), config, port).await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let argv = drop_unknown_flags(std::env::args());
    let cli = Cli::parse_from(argv);

    match cli.command {
        Commands::Run {
            queries,
            expectations,
            remote,
            flags,
        } => {
            let all_passed = cmd_run(queries, expectations, remote, flags).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::List { query, flags } => cmd_list(query, flags).await?,
        Commands::Expectations { query, file, flags } => {
            cmd_expectations(query, file, flags).await?
        }
        Commands::Server { port, flags } => cmd_server(port, flags).await?,
    }
    Ok(())
}
