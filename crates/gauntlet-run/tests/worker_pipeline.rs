//! Scheduler + worker-task pipeline, end to end

use gauntlet_config::HarnessConfig;
use gauntlet_log::{Expectation, QueryExpectation, Status};
use gauntlet_params::params;
use gauntlet_query::parse_query;
use gauntlet_run::{DedicatedWorkerRunner, Scheduler, SharedWorker};
use gauntlet_tree::{CaseAbort, MemoizedLoader, SpecFile, StaticSuiteLoader, TestGroup};
use std::sync::Arc;

fn corpus() -> Arc<MemoizedLoader<StaticSuiteLoader>> {
    let mut loader = StaticSuiteLoader::new();
    loader.add_file("suite", &["mixed"], || {
        let mut group = TestGroup::new();
        group
            .test("ok")
            .params(params().combine("n", [1i64, 2, 3]))
            .run_fn(|_ctx| async { Ok(()) });
        group.test("flaky_api").run_fn(|_ctx| async {
            Err(CaseAbort::Fail("endpoint returned garbage".into()))
        });
        group
            .test("crashy")
            .run_fn(|_ctx| async { panic!("simulated crash") });
        SpecFile {
            description: "mixed outcomes".into(),
            group,
        }
    });
    Arc::new(MemoizedLoader::new(loader))
}

#[tokio::test]
async fn dedicated_worker_runs_a_whole_file() {
    let loader = corpus();
    let runner = Arc::new(DedicatedWorkerRunner::new(
        Arc::clone(&loader),
        HarnessConfig::default(),
    ));
    let scheduler = Scheduler::new(Arc::clone(&loader), runner);

    let summary = scheduler
        .run_query(&parse_query("suite:mixed:*").unwrap(), &[])
        .await
        .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.errored, 0);

    let crashy = summary
        .results
        .iter()
        .find(|(query, _)| query == "suite:mixed:crashy:")
        .map(|(_, result)| result)
        .expect("crashy case must be recorded");
    assert_eq!(crashy.status, Status::Fail);
    assert!(crashy.logs[0].message.contains("simulated crash"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn shared_worker_with_pipelined_dispatch() {
    let loader = corpus();
    let shared = SharedWorker::new(Arc::clone(&loader), HarnessConfig::default());
    let scheduler =
        Scheduler::new(Arc::clone(&loader), Arc::new(shared.runner())).with_concurrency(4);

    let summary = scheduler
        .run_query(&parse_query("suite:mixed:ok:*").unwrap(), &[])
        .await
        .unwrap();
    assert_eq!(summary.total, 3);
    assert!(summary.all_passed());

    shared.shutdown().await;
}

#[tokio::test]
async fn expected_failures_invert_through_the_worker() {
    let loader = corpus();
    let runner = Arc::new(DedicatedWorkerRunner::new(
        Arc::clone(&loader),
        HarnessConfig::default(),
    ));
    let scheduler = Scheduler::new(Arc::clone(&loader), runner);

    let expectations = vec![QueryExpectation {
        query: "suite:mixed:flaky_api:*".into(),
        expectation: Expectation::Fail,
    }];
    let summary = scheduler
        .run_query(&parse_query("suite:mixed:flaky_api:").unwrap(), &expectations)
        .await
        .unwrap();
    assert_eq!(summary.total, 1);
    assert!(summary.all_passed(), "expected failure should count as pass");

    scheduler.shutdown().await;
}
