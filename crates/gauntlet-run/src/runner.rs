//! The pluggable case-runner contract

use futures_util::future::BoxFuture;
use gauntlet_log::{CaseResult, QueryExpectation};
use gauntlet_query::TestQuery;
use gauntlet_tree::TreeError;
use thiserror::Error;

/// Errors from dispatching a case to an execution context
///
/// These are runtime errors confined to one case: the scheduler turns them
/// into synthesized `Fail` results instead of propagating them, so one
/// broken case cannot halt the batch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("a request for `{query}` is already in flight on this runner")]
    AlreadyInFlight { query: String },

    #[error("worker channel closed before `{query}` could be dispatched")]
    ChannelClosed { query: String },

    #[error("worker exited without answering `{query}`")]
    WorkerExited { query: String },

    #[error("no loaded case matches `{query}`")]
    CaseNotFound { query: String },

    #[error("`{query}` is not a single-case query")]
    NotASingleCase { query: String },

    #[error("malformed query: {0}")]
    BadQuery(#[from] gauntlet_query::QueryError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("remote endpoint returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// An execution backend that can run one concrete case and return its
/// structured result.
pub trait CaseRunner: Send + Sync {
    /// Optional pre-loading hook for a root query; the default does
    /// nothing.
    fn prepare<'a>(&'a self, _root: &'a TestQuery) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async { Ok(()) })
    }

    /// Run the case named by `query`, applying `expectations`.
    fn run<'a>(
        &'a self,
        query: &'a str,
        expectations: &'a [QueryExpectation],
    ) -> BoxFuture<'a, Result<CaseResult, DispatchError>>;

    /// Best-effort teardown of owned execution contexts; the default does
    /// nothing.
    fn shutdown<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
