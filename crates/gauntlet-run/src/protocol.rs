//! Wire shapes shared by workers and the HTTP RPC surface
//!
//! Requests and responses are matched purely by the query's printed form;
//! there are no request ids, which is why a runner allows at most one
//! in-flight request per query text.

use gauntlet_config::HarnessConfig;
use gauntlet_log::{CaseResult, QueryExpectation, Status};
use serde::{Deserialize, Serialize};

/// A request to run one concrete case in another execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub query: String,
    #[serde(default)]
    pub expectations: Vec<QueryExpectation>,
    pub options: HarnessConfig,
}

/// The worker's answer, keyed by the same query text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub query: String,
    pub result: CaseResult,
}

/// JSON body of the HTTP RPC `/run` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRunResponse {
    pub status: Status,
    /// Pretty-printed log lines, newline separated.
    pub message: String,
    #[serde(rename = "durationMS")]
    pub duration_ms: f64,
    #[serde(
        rename = "coverageData",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub coverage_data: Option<String>,
}

impl RpcRunResponse {
    pub fn from_result(result: &CaseResult, coverage: bool) -> Self {
        Self {
            status: result.status,
            message: result
                .logs
                .iter()
                .map(|entry| entry.pretty())
                .collect::<Vec<_>>()
                .join("\n"),
            duration_ms: result.time_ms,
            coverage_data: coverage.then(String::new),
        }
    }

    /// Reconstruct a `CaseResult` on the client side of the RPC.
    pub fn into_result(self) -> CaseResult {
        let level = match self.status {
            Status::Pass => gauntlet_log::LogLevel::Info,
            Status::Skip => gauntlet_log::LogLevel::Skip,
            Status::Warn => gauntlet_log::LogLevel::Warn,
            Status::Fail => gauntlet_log::LogLevel::Exception,
        };
        let logs = if self.message.is_empty() {
            vec![]
        } else {
            vec![gauntlet_log::LogEntry::new(level, self.message)]
        };
        CaseResult {
            status: self.status,
            time_ms: self.duration_ms,
            logs,
        }
    }
}
