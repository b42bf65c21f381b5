//! Per-case recorders and the run logger
//!
//! A `CaseRecorder` is a cheap-to-clone handle that a case body writes logs
//! into while the scheduler awaits it. The final status is the worst
//! severity recorded. Subcase recorders fold their worst severity into the
//! parent, applying the expected-failure inversion.

use crate::result::{CaseResult, Expectation, LogEntry, LogLevel, Status};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug)]
struct RecorderState {
    worst: LogLevel,
    logs: Vec<LogEntry>,
    started: Option<Instant>,
    time_ms: f64,
    injected: Option<CaseResult>,
}

impl RecorderState {
    fn new() -> Self {
        Self {
            worst: LogLevel::Debug,
            logs: Vec::new(),
            started: None,
            time_ms: 0.0,
            injected: None,
        }
    }

    fn log(&mut self, entry: LogEntry) {
        if entry.level > self.worst {
            self.worst = entry.level;
        }
        self.logs.push(entry);
    }
}

/// Shared slot a recorder publishes its finished result into.
type ResultSlot = Arc<Mutex<Option<CaseResult>>>;

/// Handle for recording one case's logs and final status
///
/// Clones share state; the case body holds one clone while the scheduler
/// holds another.
#[derive(Clone)]
pub struct CaseRecorder {
    state: Arc<Mutex<RecorderState>>,
    slot: Option<ResultSlot>,
    debugging: bool,
}

impl CaseRecorder {
    pub fn new(debugging: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState::new())),
            slot: None,
            debugging,
        }
    }

    fn with_slot(debugging: bool, slot: ResultSlot) -> Self {
        Self {
            slot: Some(slot),
            ..Self::new(debugging)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        // A poisoned recorder mutex means a case body panicked mid-log;
        // the logs gathered so far are still worth reporting.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin timing the case body.
    pub fn start(&self) {
        self.lock().started = Some(Instant::now());
    }

    /// Emitted only when the harness runs in debug mode.
    pub fn debug(&self, message: impl Into<String>) {
        if !self.debugging {
            return;
        }
        self.lock().log(LogEntry::new(LogLevel::Debug, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.lock().log(LogEntry::new(LogLevel::Info, message));
    }

    pub fn skipped(&self, message: impl Into<String>) {
        self.lock().log(LogEntry::new(LogLevel::Skip, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.lock().log(LogEntry::new(LogLevel::Warn, message));
    }

    pub fn expectation_failed(&self, message: impl Into<String>) {
        self.lock()
            .log(LogEntry::new(LogLevel::ExpectFailed, message));
    }

    /// Record an exception raised by the case body, with a stack if one
    /// could be captured.
    pub fn threw(&self, message: impl Into<String>, stack: Option<String>) {
        let mut entry = LogEntry::new(LogLevel::Exception, message);
        entry.stack = stack;
        self.lock().log(entry);
    }

    /// Assert a condition, logging an expectation failure when it is false.
    pub fn expect(&self, condition: bool, message: &str) -> bool {
        if !condition {
            self.expectation_failed(message.to_string());
        }
        condition
    }

    /// Raise the recorded severity without adding a log line.
    pub fn update_status(&self, level: LogLevel) {
        let mut state = self.lock();
        if level > state.worst {
            state.worst = level;
        }
    }

    /// Overwrite this recorder's outcome with a result produced in another
    /// execution context (worker or remote round-trip).
    pub fn inject_result(&self, result: CaseResult) {
        self.lock().injected = Some(result);
    }

    /// Apply an expected-failure override to a case without subcases:
    /// an actual failure becomes a pass, an actual pass is reported as an
    /// unexpected pass.
    pub fn apply_expected_failure(&self) {
        let mut state = self.lock();
        if state.worst.status() == Status::Fail {
            state.worst = LogLevel::Info;
            state.log(LogEntry::new(LogLevel::Info, "failure was expected"));
        } else if state.worst <= LogLevel::Warn {
            state.log(LogEntry::new(
                LogLevel::ExpectFailed,
                "case passed unexpectedly",
            ));
        }
    }

    /// Open a child recorder for one subcase.
    pub fn record_subcase(&self, name: impl Into<String>) -> SubcaseRecorder {
        SubcaseRecorder {
            parent: self.clone(),
            inner: CaseRecorder::new(self.debugging),
            name: name.into(),
        }
    }

    /// Close the case and produce its result, publishing it to the logger
    /// slot if the recorder came from one.
    ///
    /// Tolerates a missing `start()` (duration reports as zero) so that a
    /// result is always produced.
    pub fn finish(&self) -> CaseResult {
        let mut state = self.lock();
        if let Some(injected) = state.injected.take() {
            drop(state);
            return self.publish(injected);
        }
        state.time_ms = state
            .started
            .take()
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        let result = CaseResult {
            status: state.worst.status(),
            time_ms: state.time_ms,
            logs: state.logs.clone(),
        };
        drop(state);
        self.publish(result)
    }

    fn publish(&self, result: CaseResult) -> CaseResult {
        if let Some(slot) = &self.slot {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(result.clone());
        }
        result
    }
}

/// Recorder for one subcase of a case
///
/// Logs are prefixed with the subcase name and folded into the parent when
/// the subcase finishes.
pub struct SubcaseRecorder {
    parent: CaseRecorder,
    inner: CaseRecorder,
    name: String,
}

impl SubcaseRecorder {
    pub fn recorder(&self) -> &CaseRecorder {
        &self.inner
    }

    /// Fold this subcase into the parent, applying the expected outcome.
    ///
    /// An expected `Fail` inverts: an actual failure becomes a pass, and an
    /// actual pass is reported as an unexpected pass. An expected `Skip`
    /// only checks that the subcase did skip.
    pub fn finish_subcase(self, expected: Expectation) {
        let mut state = self.inner.lock();
        let mut worst = state.worst;
        match expected {
            Expectation::Pass => {}
            Expectation::Fail => {
                if worst.status() == Status::Fail {
                    worst = LogLevel::Info;
                } else if worst <= LogLevel::Warn {
                    state.log(LogEntry::new(
                        LogLevel::ExpectFailed,
                        format!("subcase `{}` passed unexpectedly", self.name),
                    ));
                    worst = LogLevel::ExpectFailed;
                }
            }
            Expectation::Skip => {
                if worst.status() != Status::Skip {
                    state.log(LogEntry::new(
                        LogLevel::ExpectFailed,
                        format!("subcase `{}` was expected to skip", self.name),
                    ));
                    worst = LogLevel::ExpectFailed;
                }
            }
        }
        let logs: Vec<LogEntry> = state
            .logs
            .drain(..)
            .map(|mut entry| {
                entry.message = format!("[{}] {}", self.name, entry.message);
                entry
            })
            .collect();
        drop(state);

        let mut parent = self.parent.lock();
        for entry in logs {
            parent.logs.push(entry);
        }
        if worst > parent.worst {
            parent.worst = worst;
        }
    }
}

/// Collects results for every case of a run, keyed by printed query
///
/// Result recording for a given query is serialized by its slot lock; the
/// map itself preserves recording order for deterministic reports.
pub struct Logger {
    debugging: bool,
    results: Mutex<IndexMap<String, ResultSlot>>,
}

impl Logger {
    pub fn new(debugging: bool) -> Self {
        Self {
            debugging,
            results: Mutex::new(IndexMap::new()),
        }
    }

    /// Hand out a recorder bound to the result slot for `query`.
    pub fn record(&self, query: &str) -> CaseRecorder {
        let slot: ResultSlot = Arc::new(Mutex::new(None));
        let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.insert(query.to_string(), Arc::clone(&slot));
        CaseRecorder::with_slot(self.debugging, slot)
    }

    /// Snapshot of all finished results, in recording order.
    pub fn results(&self) -> Vec<(String, CaseResult)> {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results
            .iter()
            .filter_map(|(query, slot)| {
                let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
                slot.clone().map(|result| (query.clone(), result))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn worst_severity_wins() {
        let rec = CaseRecorder::new(false);
        rec.start();
        rec.info("setting up");
        rec.warn("took a while");
        rec.info("tearing down");
        let result = rec.finish();
        assert_eq!(result.status, Status::Warn);
        assert_eq!(result.logs.len(), 3);
    }

    #[test]
    fn debug_suppressed_unless_debugging() {
        let rec = CaseRecorder::new(false);
        rec.debug("hidden");
        assert_eq!(rec.finish().logs.len(), 0);

        let rec = CaseRecorder::new(true);
        rec.debug("visible");
        assert_eq!(rec.finish().logs.len(), 1);
    }

    #[test]
    fn exception_means_fail() {
        let rec = CaseRecorder::new(false);
        rec.start();
        rec.threw("boom", Some("at body".into()));
        let result = rec.finish();
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.logs[0].stack.as_deref(), Some("at body"));
    }

    #[test]
    fn finish_without_start_reports_zero_duration() {
        let rec = CaseRecorder::new(false);
        let result = rec.finish();
        assert_eq!(result.time_ms, 0.0);
        assert_eq!(result.status, Status::Pass);
    }

    #[test]
    fn subcase_folds_into_parent() {
        let rec = CaseRecorder::new(false);
        rec.start();

        let sub = rec.record_subcase("offset=0");
        sub.recorder().expectation_failed("mismatch");
        sub.finish_subcase(Expectation::Pass);

        let sub = rec.record_subcase("offset=8");
        sub.recorder().info("fine");
        sub.finish_subcase(Expectation::Pass);

        let result = rec.finish();
        assert_eq!(result.status, Status::Fail);
        assert!(result.logs[0].message.starts_with("[offset=0]"));
    }

    #[test]
    fn expected_fail_inverts() {
        let rec = CaseRecorder::new(false);
        let sub = rec.record_subcase("s");
        sub.recorder().expectation_failed("known bad");
        sub.finish_subcase(Expectation::Fail);
        assert_eq!(rec.finish().status, Status::Pass);

        let rec = CaseRecorder::new(false);
        let sub = rec.record_subcase("s");
        sub.finish_subcase(Expectation::Fail);
        assert_eq!(rec.finish().status, Status::Fail);
    }

    #[test]
    fn injected_result_wins() {
        let rec = CaseRecorder::new(false);
        rec.start();
        rec.warn("local noise");
        rec.inject_result(CaseResult {
            status: Status::Skip,
            time_ms: 3.5,
            logs: vec![],
        });
        let result = rec.finish();
        assert_eq!(result.status, Status::Skip);
        assert_eq!(result.time_ms, 3.5);
    }

    #[test]
    fn logger_collects_in_order() {
        let logger = Logger::new(false);
        let a = logger.record("demo:f:t:x=1");
        let b = logger.record("demo:f:t:x=2");
        b.start();
        b.finish();
        a.start();
        a.threw("late failure", None);
        a.finish();

        let results = logger.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "demo:f:t:x=1");
        assert_eq!(results[0].1.status, Status::Fail);
        assert_eq!(results[1].1.status, Status::Pass);
    }
}
