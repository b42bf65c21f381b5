//! End-to-end coverage of the HTTP RPC surface and the remote runner

use gauntlet_cli::server::{build_router, ServerState};
use gauntlet_cli::suites::demo_loader;
use gauntlet_config::HarnessConfig;
use gauntlet_query::parse_query;
use gauntlet_run::{RemoteRunner, RpcRunResponse, Scheduler};
use gauntlet_tree::MemoizedLoader;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

async fn spawn_server(options: HarnessConfig) -> (SocketAddr, mpsc::Receiver<()>) {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let state = Arc::new(ServerState::new(
        Arc::new(MemoizedLoader::new(demo_loader())),
        options,
        shutdown_tx,
    ));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, shutdown_rx)
}

fn url(addr: SocketAddr, path: &str, query: &str) -> String {
    format!("http://{addr}/{path}?{}", urlencoding::encode(query))
}

#[tokio::test]
async fn load_then_run_round_trip() {
    let (addr, _shutdown) = spawn_server(HarnessConfig::default()).await;
    let client = reqwest::Client::new();

    // Running before loading is a 404.
    let response = client
        .post(url(addr, "run", "demo:arith:add:a=0;b=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Load the whole suite.
    let response = client
        .post(url(addr, "load", "demo:*"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A loaded case runs and reports JSON.
    let response = client
        .post(url(addr, "run", "demo:arith:add:a=0;b=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: RpcRunResponse = response.json().await.unwrap();
    assert_eq!(body.status, gauntlet_log::Status::Pass);

    // A case outside the corpus is still a 404.
    let response = client
        .post(url(addr, "run", "demo:arith:missing:"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Malformed queries are a 500 with the parse error in the body.
    let response = client
        .post(format!("http://{addr}/load?demo"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert!(response.text().await.unwrap().contains("suite"));
}

#[tokio::test]
async fn terminate_stops_accepting() {
    let (addr, mut shutdown) = spawn_server(HarnessConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/terminate"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    // The shutdown signal reached the channel the real server waits on.
    assert!(shutdown.recv().await.is_some());
}

#[tokio::test]
async fn remote_runner_drives_the_server() {
    let (addr, _shutdown) = spawn_server(HarnessConfig::default()).await;

    let loader = Arc::new(MemoizedLoader::new(demo_loader()));
    let runner = Arc::new(RemoteRunner::new(format!("http://{addr}")));
    let scheduler = Scheduler::new(loader, runner);

    let summary = scheduler
        .run_query(&parse_query("demo:arith:add:*").unwrap(), &[])
        .await
        .unwrap();
    assert_eq!(summary.total, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.errored, 0);
    assert!(summary.all_passed());
}

#[tokio::test]
async fn skip_status_travels_over_the_wire() {
    let (addr, _shutdown) = spawn_server(HarnessConfig::default()).await;
    let client = reqwest::Client::new();

    client
        .post(url(addr, "load", "demo:text:*"))
        .send()
        .await
        .unwrap();
    let response = client
        .post(url(addr, "run", "demo:text:empty_input:strict=false"))
        .send()
        .await
        .unwrap();
    let body: RpcRunResponse = response.json().await.unwrap();
    assert_eq!(body.status, gauntlet_log::Status::Skip);
}
