//! Structured pass/fail/skip results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final status of one case (or subcase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Skip,
    Warn,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Pass => "pass",
            Status::Skip => "skip",
            Status::Warn => "warn",
            Status::Fail => "fail",
        };
        write!(f, "{text}")
    }
}

/// Severity of one log entry, ordered worst-last.
///
/// A case's final status is derived from the worst severity it logged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Skip,
    Warn,
    ExpectFailed,
    Exception,
}

impl LogLevel {
    /// The case status a worst-severity of `self` maps to.
    pub fn status(self) -> Status {
        match self {
            LogLevel::Debug | LogLevel::Info => Status::Pass,
            LogLevel::Skip => Status::Skip,
            LogLevel::Warn => Status::Warn,
            LogLevel::ExpectFailed | LogLevel::Exception => Status::Fail,
        }
    }
}

/// One log line attached to a case result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// One-line rendering used by reporters and the RPC `message` field.
    pub fn pretty(&self) -> String {
        match &self.stack {
            Some(stack) => format!("{:?}: {}\n{stack}", self.level, self.message),
            None => format!("{:?}: {}", self.level, self.message),
        }
    }
}

/// The structured result of running one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub status: Status,
    /// Wall-clock duration of the case body in milliseconds.
    #[serde(rename = "timems")]
    pub time_ms: f64,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl CaseResult {
    /// A synthesized failure, used when dispatch itself broke or a body
    /// panicked before the recorder could run.
    pub fn synthesized_fail(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            time_ms: 0.0,
            logs: vec![LogEntry::new(LogLevel::Exception, message)],
        }
    }
}

/// A pre-classified outcome attached to a query by an expectations file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Pass,
    Fail,
    Skip,
}

/// An expectation scoped to a whole-subtree query, shipped with run
/// requests so remote contexts apply the same overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExpectation {
    pub query: String,
    pub expectation: Expectation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn severity_order() {
        assert!(LogLevel::Debug < LogLevel::Skip);
        assert!(LogLevel::Skip < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::ExpectFailed);
        assert!(LogLevel::ExpectFailed < LogLevel::Exception);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(LogLevel::Info.status(), Status::Pass);
        assert_eq!(LogLevel::Skip.status(), Status::Skip);
        assert_eq!(LogLevel::Exception.status(), Status::Fail);
    }

    #[test]
    fn result_serde_roundtrip() {
        let result = CaseResult {
            status: Status::Warn,
            time_ms: 12.25,
            logs: vec![
                LogEntry::new(LogLevel::Warn, "late frame"),
                LogEntry::new(LogLevel::Exception, "boom").with_stack("at case body"),
            ],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"timems\":12.25"));
        let back: CaseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
