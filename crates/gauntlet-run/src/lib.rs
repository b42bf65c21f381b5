//! Gauntlet execution scheduler and case runners
//!
//! The scheduler walks the leaves of a loaded test tree and drives each
//! case through a pluggable `CaseRunner`: directly in-process, via owned
//! or shared worker tasks (separate execution contexts speaking a
//! query-keyed message protocol), or via a remote HTTP endpoint. Every
//! scheduled case yields exactly one `CaseResult`; a broken channel or a
//! panicking case body becomes a synthesized failure, never an aborted
//! batch.

pub mod in_process;
pub mod protocol;
pub mod remote;
pub mod runner;
pub mod scheduler;
pub mod worker;

pub use in_process::InProcessRunner;
pub use protocol::{RpcRunResponse, WorkerRequest, WorkerResponse};
pub use remote::RemoteRunner;
pub use runner::{CaseRunner, DispatchError};
pub use scheduler::{CaseState, RunSummary, Scheduler};
pub use worker::{DedicatedWorkerRunner, SharedWorker, SharedWorkerRunner, WorkerHandle};
