//! Run reporter - display case results

use colored::*;
use gauntlet_log::Status;
use gauntlet_run::RunSummary;
use std::io::{self, Write};

/// Result reporter with output configuration
pub struct RunReporter {
    /// Show every case's result and logs as a line.
    verbose: bool,
    /// Disable colored output.
    no_color: bool,
}

impl RunReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
        }
    }

    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Report a finished run.
    pub fn report(&self, summary: &RunSummary) {
        if self.no_color {
            colored::control::set_override(false);
        }

        for (query, result) in &summary.results {
            self.print_case(query, result.status, result.time_ms);
        }

        if !self.verbose && !summary.results.is_empty() {
            println!();
        }

        println!();
        self.print_summary(summary);
        self.print_failures(summary);

        if self.no_color {
            colored::control::unset_override();
        }
    }

    fn print_case(&self, query: &str, status: Status, time_ms: f64) {
        if self.verbose {
            let tag = match status {
                Status::Pass => "PASS".green().bold(),
                Status::Fail => "FAIL".red().bold(),
                Status::Warn => "WARN".yellow().bold(),
                Status::Skip => "SKIP".cyan(),
            };
            println!("{tag} {query} ({time_ms:.2}ms)");
        } else {
            let dot = match status {
                Status::Pass => ".".green(),
                Status::Fail => "F".red().bold(),
                Status::Warn => "W".yellow().bold(),
                Status::Skip => "s".cyan(),
            };
            print!("{dot}");
            let _ = io::stdout().flush();
        }
    }

    fn print_summary(&self, summary: &RunSummary) {
        println!("{}", "─".repeat(50));

        let status = if summary.failed > 0 {
            "FAILED".red().bold()
        } else {
            "PASSED".green().bold()
        };
        println!(
            "Run result: {} | {} total, {} passed, {} failed, {} warned, {} skipped",
            status,
            summary.total.to_string().bold(),
            summary.passed.to_string().green().bold(),
            if summary.failed > 0 {
                summary.failed.to_string().red().bold()
            } else {
                summary.failed.to_string().normal()
            },
            summary.warned,
            summary.skipped,
        );
        if summary.errored > 0 {
            println!(
                "{} {} case(s) had dispatch errors",
                "note:".yellow(),
                summary.errored
            );
        }
        println!("Time: {:.2?}", summary.duration);
    }

    fn print_failures(&self, summary: &RunSummary) {
        let failures: Vec<_> = summary
            .results
            .iter()
            .filter(|(_, result)| result.status == Status::Fail)
            .collect();
        if failures.is_empty() {
            return;
        }

        println!();
        println!("{}", "Failures:".red().bold());
        println!();
        for (query, result) in failures {
            println!("  {} {}", "●".red(), query.bold());
            for entry in &result.logs {
                for line in entry.pretty().lines() {
                    println!("      {}", line.dimmed());
                }
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_log::CaseResult;
    use std::time::Duration;

    fn summary(results: Vec<(String, CaseResult)>) -> RunSummary {
        let failed = results
            .iter()
            .filter(|(_, r)| r.status == Status::Fail)
            .count();
        RunSummary {
            total: results.len(),
            passed: results.len() - failed,
            failed,
            warned: 0,
            skipped: 0,
            errored: 0,
            duration: Duration::from_millis(12),
            results,
        }
    }

    #[test]
    fn reporter_does_not_panic() {
        let summary = summary(vec![
            (
                "demo:arith:add:a=0;b=0".into(),
                CaseResult {
                    status: Status::Pass,
                    time_ms: 1.0,
                    logs: vec![],
                },
            ),
            (
                "demo:arith:add:a=1;b=0".into(),
                CaseResult::synthesized_fail("boom"),
            ),
        ]);

        for verbose in [false, true] {
            let reporter = RunReporter::new(verbose).with_no_color(true);
            reporter.report(&summary);
        }
    }

    #[test]
    fn empty_run_reports() {
        let reporter = RunReporter::new(true).with_no_color(true);
        reporter.report(&summary(vec![]));
    }
}
