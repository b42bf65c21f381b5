//! The execution scheduler
//!
//! Loads the subtree for a root query, walks its leaves, and drives every
//! case through a `CaseRunner` with bounded concurrency. Dispatch of
//! independent queries may be pipelined; recording happens as results
//! arrive, serialized per query by the logger slots.

use crate::runner::{CaseRunner, DispatchError};
use futures_util::stream::{self, StreamExt};
use gauntlet_log::{CaseResult, QueryExpectation, Status};
use gauntlet_query::TestQuery;
use gauntlet_tree::{load_tree, MemoizedLoader, SuiteLoader, TreeError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-case dispatch state, independent across cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Queued,
    Dispatched,
    Completed,
    /// Dispatch broke; the recorded result is synthesized.
    Errored,
}

/// Aggregated outcome of one `run_query` invocation.
#[derive(Debug)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub skipped: usize,
    /// Cases whose result was synthesized from a dispatch error.
    pub errored: usize,
    pub duration: Duration,
    /// Every case's result, in recording order.
    pub results: Vec<(String, CaseResult)>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Owns a runner and dispatches the cases of a query to it.
///
/// The scheduler owns its execution contexts: call `shutdown()` when done
/// instead of relying on process teardown.
pub struct Scheduler<L> {
    loader: Arc<MemoizedLoader<L>>,
    runner: Arc<dyn CaseRunner>,
    concurrency: usize,
}

impl<L: SuiteLoader + 'static> Scheduler<L> {
    pub fn new(loader: Arc<MemoizedLoader<L>>, runner: Arc<dyn CaseRunner>) -> Self {
        Self {
            loader,
            runner,
            concurrency: 1,
        }
    }

    /// Allow up to `n` cases in flight at once (minimum 1).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Run every case selected by `root`, recording exactly one result per
    /// case. Tree and registration errors abort the invocation; dispatch
    /// errors are confined to their case.
    pub async fn run_query(
        &self,
        root: &TestQuery,
        expectations: &[QueryExpectation],
    ) -> Result<RunSummary, TreeError> {
        let started = Instant::now();

        if let Err(err) = self.runner.prepare(root).await {
            // Each case will fail individually with its own dispatch error.
            tracing::warn!(error = %err, "runner prepare failed");
        }

        let tree = load_tree(self.loader.as_ref(), root).await?;
        let queries: Vec<String> = tree
            .leaves()
            .iter()
            .map(|case| case.query.to_string())
            .collect();

        let states: Mutex<HashMap<String, CaseState>> = Mutex::new(
            queries
                .iter()
                .map(|q| (q.clone(), CaseState::Queued))
                .collect(),
        );
        tracing::info!(root = %root, cases = queries.len(), "dispatching");

        let runner = &self.runner;
        let states_ref = &states;
        let mut in_flight = stream::iter(queries)
            .map(|query| async move {
                set_state(states_ref, &query, CaseState::Dispatched);
                let outcome = runner.run(&query, expectations).await;
                (query, outcome)
            })
            .buffer_unordered(self.concurrency);

        let mut results: Vec<(String, CaseResult)> = Vec::new();
        let mut errored = 0usize;
        while let Some((query, outcome)) = in_flight.next().await {
            let result = match outcome {
                Ok(result) => {
                    set_state(states_ref, &query, CaseState::Completed);
                    result
                }
                Err(err) => {
                    set_state(states_ref, &query, CaseState::Errored);
                    errored += 1;
                    synthesize(&query, err)
                }
            };
            results.push((query, result));
        }

        Ok(summarize(results, errored, started.elapsed()))
    }

    /// Deterministic teardown of the runner's execution contexts.
    pub async fn shutdown(&self) {
        self.runner.shutdown().await;
    }
}

fn set_state(states: &Mutex<HashMap<String, CaseState>>, query: &str, state: CaseState) {
    let mut states = states.lock().unwrap_or_else(|e| e.into_inner());
    states.insert(query.to_string(), state);
}

fn synthesize(query: &str, err: DispatchError) -> CaseResult {
    tracing::warn!(query, error = %err, "dispatch failed; synthesizing result");
    CaseResult::synthesized_fail(err.to_string())
}

fn summarize(
    results: Vec<(String, CaseResult)>,
    errored: usize,
    duration: Duration,
) -> RunSummary {
    let mut summary = RunSummary {
        total: results.len(),
        passed: 0,
        failed: 0,
        warned: 0,
        skipped: 0,
        errored,
        duration,
        results,
    };
    for (_, result) in &summary.results {
        match result.status {
            Status::Pass => summary.passed += 1,
            Status::Fail => summary.failed += 1,
            Status::Warn => summary.warned += 1,
            Status::Skip => summary.skipped += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process::InProcessRunner;
    use futures_util::future::BoxFuture;
    use gauntlet_config::HarnessConfig;
    use gauntlet_query::parse_query;
    use gauntlet_tree::{CaseAbort, SpecFile, StaticSuiteLoader, TestGroup};

    fn loader() -> Arc<MemoizedLoader<StaticSuiteLoader>> {
        let mut loader = StaticSuiteLoader::new();
        loader.add_file("demo", &["f"], || {
            let mut group = TestGroup::new();
            group.test("passes").run_fn(|_ctx| async { Ok(()) });
            group.test("skips").run_fn(|_ctx| async {
                Err(CaseAbort::Skip("not applicable".into()))
            });
            group.test("panics").run_fn(|_ctx| async { panic!("boom") });
            SpecFile {
                description: String::new(),
                group,
            }
        });
        Arc::new(MemoizedLoader::new(loader))
    }

    #[tokio::test]
    async fn totality_over_a_mixed_file() {
        let loader = loader();
        let runner = Arc::new(InProcessRunner::new(
            Arc::clone(&loader),
            HarnessConfig::default(),
        ));
        let scheduler = Scheduler::new(loader, runner);
        let summary = scheduler
            .run_query(&parse_query("demo:f:*").unwrap(), &[])
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errored, 0);
        assert!(!summary.all_passed());
    }

    /// A runner whose dispatch always breaks.
    struct BrokenRunner;

    impl CaseRunner for BrokenRunner {
        fn run<'a>(
            &'a self,
            query: &'a str,
            _expectations: &'a [gauntlet_log::QueryExpectation],
        ) -> BoxFuture<'a, Result<CaseResult, DispatchError>> {
            Box::pin(async move {
                Err(DispatchError::ChannelClosed {
                    query: query.to_string(),
                })
            })
        }
    }

    #[tokio::test]
    async fn dispatch_errors_become_synthesized_fails() {
        let scheduler = Scheduler::new(loader(), Arc::new(BrokenRunner));
        let summary = scheduler
            .run_query(&parse_query("demo:f:*").unwrap(), &[])
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.errored, 3);
        for (_, result) in &summary.results {
            assert_eq!(result.status, Status::Fail);
            assert!(!result.logs.is_empty());
        }
    }

    #[tokio::test]
    async fn concurrency_still_records_every_case() {
        let loader = loader();
        let runner = Arc::new(InProcessRunner::new(
            Arc::clone(&loader),
            HarnessConfig::default(),
        ));
        let scheduler = Scheduler::new(loader, runner).with_concurrency(4);
        let summary = scheduler
            .run_query(&parse_query("demo:f:*").unwrap(), &[])
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.results.len(), 3);
    }
}
