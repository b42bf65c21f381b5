//! Worker-task execution contexts
//!
//! A worker is a spawned task owning its own `InProcessRunner`, fed
//! requests over a channel and answering on another. Responses carry only
//! the query text, and a pending-response map keyed by that text resolves
//! them - which is exactly why a second request for the same query before
//! the first resolves is a programming error, surfaced loudly rather than
//! silently queued.

use crate::in_process::InProcessRunner;
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::runner::{CaseRunner, DispatchError};
use futures_util::future::BoxFuture;
use gauntlet_config::HarnessConfig;
use gauntlet_log::{CaseResult, QueryExpectation};
use gauntlet_tree::{MemoizedLoader, SuiteLoader};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum WorkerInbound {
    Run(WorkerRequest),
    /// Finish or abandon the current request, then exit.
    Terminate,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<CaseResult>>>>;

/// Handle to one spawned worker task.
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerInbound>,
    pending: PendingMap,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Spawn a worker task plus the response pump that resolves pending
    /// requests by query text.
    pub fn spawn<L: SuiteLoader + 'static>(
        loader: Arc<MemoizedLoader<L>>,
        options: HarnessConfig,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerInbound>();
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<WorkerResponse>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let worker = tokio::spawn(async move {
            let runner = InProcessRunner::new(loader, options);
            while let Some(inbound) = rx.recv().await {
                match inbound {
                    WorkerInbound::Run(request) => {
                        let result = runner
                            .run(&request.query, &request.expectations)
                            .await
                            .unwrap_or_else(|err| {
                                CaseResult::synthesized_fail(err.to_string())
                            });
                        let response = WorkerResponse {
                            query: request.query,
                            result,
                        };
                        if resp_tx.send(response).is_err() {
                            break;
                        }
                    }
                    WorkerInbound::Terminate => break,
                }
            }
        });

        let pump_pending = Arc::clone(&pending);
        let pump = tokio::spawn(async move {
            while let Some(response) = resp_rx.recv().await {
                let resolver = {
                    let mut pending = pump_pending.lock().unwrap_or_else(|e| e.into_inner());
                    pending.remove(&response.query)
                };
                match resolver {
                    Some(resolver) => {
                        let _ = resolver.send(response.result);
                    }
                    None => {
                        tracing::warn!(query = %response.query, "unmatched worker response");
                    }
                }
            }
        });

        Self {
            tx,
            pending,
            tasks: Mutex::new(vec![worker, pump]),
        }
    }

    /// Post a request and await its response.
    pub async fn run(&self, request: WorkerRequest) -> Result<CaseResult, DispatchError> {
        let query = request.query.clone();
        let (resolve, resolved) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.contains_key(&query) {
                return Err(DispatchError::AlreadyInFlight { query });
            }
            pending.insert(query.clone(), resolve);
        }

        if self.tx.send(WorkerInbound::Run(request)).is_err() {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&query);
            return Err(DispatchError::ChannelClosed { query });
        }

        resolved
            .await
            .map_err(|_| DispatchError::WorkerExited { query })
    }

    /// Ask the worker to exit and await both tasks, best-effort.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(WorkerInbound::Terminate);
        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// A runner that owns one worker task outright.
pub struct DedicatedWorkerRunner {
    handle: WorkerHandle,
    options: HarnessConfig,
}

impl DedicatedWorkerRunner {
    pub fn new<L: SuiteLoader + 'static>(
        loader: Arc<MemoizedLoader<L>>,
        options: HarnessConfig,
    ) -> Self {
        Self {
            handle: WorkerHandle::spawn(loader, options.clone()),
            options,
        }
    }
}

impl CaseRunner for DedicatedWorkerRunner {
    fn run<'a>(
        &'a self,
        query: &'a str,
        expectations: &'a [QueryExpectation],
    ) -> BoxFuture<'a, Result<CaseResult, DispatchError>> {
        Box::pin(self.handle.run(WorkerRequest {
            query: query.to_string(),
            expectations: expectations.to_vec(),
            options: self.options.clone(),
        }))
    }

    fn shutdown<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(self.handle.shutdown())
    }
}

/// One worker task multiplexed between any number of runner handles.
pub struct SharedWorker {
    handle: Arc<WorkerHandle>,
    options: HarnessConfig,
}

impl SharedWorker {
    pub fn new<L: SuiteLoader + 'static>(
        loader: Arc<MemoizedLoader<L>>,
        options: HarnessConfig,
    ) -> Self {
        Self {
            handle: Arc::new(WorkerHandle::spawn(loader, options.clone())),
            options,
        }
    }

    /// A runner borrowing this worker. Shutting the runner down is a no-op;
    /// only the `SharedWorker` owner tears the task down.
    pub fn runner(&self) -> SharedWorkerRunner {
        SharedWorkerRunner {
            handle: Arc::clone(&self.handle),
            options: self.options.clone(),
        }
    }

    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

/// A `CaseRunner` view onto a `SharedWorker`.
pub struct SharedWorkerRunner {
    handle: Arc<WorkerHandle>,
    options: HarnessConfig,
}

impl CaseRunner for SharedWorkerRunner {
    fn run<'a>(
        &'a self,
        query: &'a str,
        expectations: &'a [QueryExpectation],
    ) -> BoxFuture<'a, Result<CaseResult, DispatchError>> {
        Box::pin(self.handle.run(WorkerRequest {
            query: query.to_string(),
            expectations: expectations.to_vec(),
            options: self.options.clone(),
        }))
    }
}
