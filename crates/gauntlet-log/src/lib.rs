//! Gauntlet result model and per-case recorders
//!
//! Every scheduled case produces exactly one `CaseResult`; the recorder is
//! how a running case body (or a worker round-trip) feeds logs and a final
//! status into it. The types here are the wire shapes of the worker
//! protocol and the HTTP RPC surface.

pub mod recorder;
pub mod result;

pub use recorder::{CaseRecorder, Logger, SubcaseRecorder};
pub use result::{CaseResult, Expectation, LogEntry, LogLevel, QueryExpectation, Status};
