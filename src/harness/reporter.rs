//! Spawner output.
//!
//! The spawner reports through the [`TestReporter`] trait so the console format can be swapped out (or captured in
//! tests). [`ConsoleReporter`] writes a terse `passed` line per matching test on standard output, a full
//! expected-versus-actual diagnostic per mismatch on standard error, and a closing summary.

use std::io::{self, Write};
use std::time::Duration;

use forkcase_core::ExpectedOutcome;

use crate::fault::signal_name;
use crate::protocol::StatusMessage;

/// Outcome of one spawned test, as seen by the spawner.
#[derive(Debug)]
pub struct CaseOutcome<'a> {
    pub path: &'a str,
    pub expected: ExpectedOutcome,
    pub actual: &'a StatusMessage,
    pub duration: Duration,
}

impl CaseOutcome<'_> {
    pub fn passed(&self) -> bool {
        self.expected
            .matches(self.actual.result, self.actual.stage, self.actual.signal)
    }
}

/// Summary of a spawner run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl RunSummary {
    /// Share of passing tests in percent, or `None` when nothing ran.
    pub fn pass_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.passed as f64 * 100.0 / self.total as f64)
        }
    }
}

/// Receives spawner progress.
pub trait TestReporter {
    /// Called once, before any child is launched.
    fn on_collection_complete(&mut self, _test_count: usize) {}

    fn on_test_start(&mut self, _path: &str) {}

    fn on_test_complete(&mut self, outcome: &CaseOutcome<'_>);

    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Plain-text reporter for a terminal.
pub struct ConsoleReporter<O: Write, E: Write> {
    out: O,
    err: E,
    pub verbose: bool,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    pub fn new(verbose: bool) -> Self {
        Self::with_writers(io::stdout(), io::stderr(), verbose)
    }
}

impl<O: Write, E: Write> ConsoleReporter<O, E> {
    pub fn with_writers(out: O, err: E, verbose: bool) -> Self {
        Self { out, err, verbose }
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> TestReporter for ConsoleReporter<O, E> {
    fn on_test_start(&mut self, path: &str) {
        if self.verbose {
            let _ = writeln!(self.err, "running {path}");
        }
    }

    fn on_test_complete(&mut self, outcome: &CaseOutcome<'_>) {
        let timing = if self.verbose {
            format!(" ({}ms)", outcome.duration.as_millis())
        } else {
            String::new()
        };

        if outcome.passed() {
            let _ = writeln!(self.out, "passed {}{timing}", outcome.path);
            return;
        }

        let actual = outcome.actual;
        let signal = if actual.signal > 0 {
            format!("{} ({})", actual.signal, signal_name(actual.signal))
        } else {
            actual.signal.to_string()
        };
        let _ = writeln!(
            self.err,
            "FAILED {}: expected {}, but got {} during {} with signal {signal}{timing}",
            outcome.path, outcome.expected, actual.result, actual.stage
        );
        if !actual.message.is_empty() {
            for line in actual.message_text().lines() {
                let _ = writeln!(self.err, "    {line}");
            }
        }
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        match summary.pass_rate() {
            None => {
                let _ = writeln!(self.out, "0 tests were run");
            }
            Some(rate) => {
                let _ = writeln!(
                    self.out,
                    "{rate:.2}% tests passed, {} tests failed out of {}",
                    summary.failed, summary.total
                );
            }
        }
        if self.verbose {
            let _ = writeln!(self.err, "finished in {:.2}s", summary.duration.as_secs_f64());
        }
        let _ = self.out.flush();
    }
}
