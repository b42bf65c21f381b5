//! HTTP RPC server
//!
//! Exposes the harness over three endpoints, keyed by printed query text:
//! - `GET/POST /load?<query>` loads and registers every matching case
//! - `GET/POST /run?<query>` executes a previously loaded case
//! - `GET/POST /terminate` stops the listener and lets the process exit

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use gauntlet_config::HarnessConfig;
use gauntlet_log::Logger;
use gauntlet_query::{parse_query, QueryLevel};
use gauntlet_run::RpcRunResponse;
use gauntlet_tree::{load_tree, MemoizedLoader, StaticSuiteLoader, TestCase};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Shared state behind the RPC endpoints.
pub struct ServerState {
    loader: Arc<MemoizedLoader<StaticSuiteLoader>>,
    cases: Mutex<HashMap<String, Arc<TestCase>>>,
    logger: Logger,
    options: HarnessConfig,
    shutdown: mpsc::Sender<()>,
}

impl ServerState {
    pub fn new(
        loader: Arc<MemoizedLoader<StaticSuiteLoader>>,
        options: HarnessConfig,
        shutdown: mpsc::Sender<()>,
    ) -> Self {
        Self {
            loader,
            cases: Mutex::new(HashMap::new()),
            logger: Logger::new(options.debug),
            options,
            shutdown,
        }
    }

    /// Results recorded so far, for post-run aggregation.
    pub fn results(&self) -> Vec<(String, gauntlet_log::CaseResult)> {
        self.logger.results()
    }
}

/// Build the RPC router over `state`.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/load", any(handle_load))
        .route("/run", any(handle_run))
        .route("/terminate", any(handle_terminate))
        .with_state(state)
}

/// Serve until `/terminate` is called.
///
/// Prints the bound port in the stable `[[port]]` form wrapper tools grep
/// for.
pub async fn serve(
    loader: Arc<MemoizedLoader<StaticSuiteLoader>>,
    options: HarnessConfig,
    port: u16,
) -> anyhow::Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let state = Arc::new(ServerState::new(loader, options, shutdown_tx));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    println!("Server listening at [[{}]]", addr.port());

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;
    Ok(())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, message).into_response()
}

async fn handle_load(
    State(state): State<Arc<ServerState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let Some(raw) = raw else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "missing query string".into(),
        );
    };
    let query = match parse_query(&raw) {
        Ok(query) => query,
        Err(err) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };
    let tree = match load_tree(state.loader.as_ref(), &query).await {
        Ok(tree) => tree,
        Err(err) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let leaves = tree.leaves();
    let mut cases = state.cases.lock().unwrap_or_else(|e| e.into_inner());
    for case in &leaves {
        cases.insert(case.query.to_string(), Arc::clone(case));
    }
    tracing::info!(query = %query, loaded = leaves.len(), "loaded cases");
    (StatusCode::OK, format!("loaded {} case(s)", leaves.len())).into_response()
}

async fn handle_run(
    State(state): State<Arc<ServerState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let Some(raw) = raw else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "missing query string".into(),
        );
    };
    // Canonicalize so percent-encoded requests hit the same key the load
    // step registered.
    let query = match parse_query(&raw) {
        Ok(query) if query.level() == QueryLevel::Single => query,
        Ok(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("`{raw}` is not a single-case query"),
            );
        }
        Err(err) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };
    let name = query.to_string();

    let case = {
        let cases = state.cases.lock().unwrap_or_else(|e| e.into_inner());
        cases.get(&name).cloned()
    };
    let Some(case) = case else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("test case '{name}' was never loaded"),
        );
    };

    let recorder = state.logger.record(&name);
    let result = case.execute(recorder, &[]).await;
    let body = RpcRunResponse::from_result(&result, state.options.coverage);
    (StatusCode::OK, Json(body)).into_response()
}

async fn handle_terminate(State(state): State<Arc<ServerState>>) -> Response {
    tracing::info!("terminate requested");
    let _ = state.shutdown.send(()).await;
    (StatusCode::OK, "terminating").into_response()
}
