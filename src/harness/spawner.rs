//! Parent-side orchestrator: one child process per scheduled test, strictly one at a time.

use std::time::Instant;

use crate::registry::Directory;

use super::launcher::{ChildLauncher, SpawnError};
use super::reporter::{CaseOutcome, RunSummary, TestReporter};

/// Walks the scheduled tests of a registry and runs each through a [`ChildLauncher`].
pub struct Spawner<L, R> {
    launcher: L,
    reporter: R,
}

impl<L: ChildLauncher, R: TestReporter> Spawner<L, R> {
    pub fn new(launcher: L, reporter: R) -> Self {
        Self { launcher, reporter }
    }

    /// Run every scheduled test of `root` in listing order and report the results.
    ///
    /// Mismatches between expected and actual outcomes are counted, never raised.
    ///
    /// ## Errors
    /// - [`SpawnError`] when a child cannot be launched or awaited, or sends a corrupt report.
    pub fn run(&mut self, root: &Directory) -> Result<RunSummary, SpawnError> {
        let start = Instant::now();
        let scheduled = root.scheduled_cases();
        self.reporter.on_collection_complete(scheduled.len());

        let mut summary = RunSummary::default();
        for case in &scheduled {
            self.reporter.on_test_start(&case.path);
            let launched = Instant::now();
            let actual = self.launcher.launch(&case.path)?;

            let outcome = CaseOutcome {
                path: &case.path,
                expected: case.case.expected(),
                actual: &actual,
                duration: launched.elapsed(),
            };
            summary.total += 1;
            if outcome.passed() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
                tracing::debug!(path = %case.path, result = %actual.result, stage = %actual.stage, "outcome mismatch");
            }
            self.reporter.on_test_complete(&outcome);
        }

        summary.duration = start.elapsed();
        self.reporter.on_run_complete(&summary);
        Ok(summary)
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::{ProtocolError, StatusMessage};
    use crate::registry::Runnable;
    use forkcase_core::{ExpectedOutcome, ResultKind, Stage};
    use std::collections::HashMap;

    /// Launcher answering from a table instead of starting processes.
    #[derive(Default)]
    struct Canned {
        answers: HashMap<&'static str, StatusMessage>,
        launched: Vec<String>,
    }

    impl ChildLauncher for Canned {
        fn launch(&mut self, path: &str) -> Result<StatusMessage, SpawnError> {
            self.launched.push(path.to_string());
            self.answers
                .get(path)
                .cloned()
                .ok_or_else(|| SpawnError::Protocol {
                    path: path.to_string(),
                    source: ProtocolError::Malformed {
                        field: "result",
                        line: "garbage".to_string(),
                    },
                })
        }
    }

    #[derive(Default)]
    struct Recording {
        completed: Vec<(String, bool)>,
        summary: Option<RunSummary>,
    }

    impl TestReporter for Recording {
        fn on_test_complete(&mut self, outcome: &CaseOutcome<'_>) {
            self.completed.push((outcome.path.to_string(), outcome.passed()));
        }

        fn on_run_complete(&mut self, summary: &RunSummary) {
            self.summary = Some(*summary);
        }
    }

    fn registry() -> Directory {
        let mut root = Directory::root();
        root.register_fn(&["linalg", "det"], |_| Ok(()));
        root.register(
            &["linalg", "singular"],
            Runnable::function(|_| Ok(())),
            ExpectedOutcome::caught_signal(libc::SIGFPE, Stage::Shutdown),
            None,
        );
        root.register_fn(&["poly", "eval"], |_| Ok(()));
        root
    }

    #[test]
    fn test_compares_expected_and_actual() {
        let root = registry();
        let mut canned = Canned::default();
        canned.answers.insert("/linalg/det", StatusMessage::completed());
        // Expected a signal during shutdown but the test completed.
        canned.answers.insert("/linalg/singular", StatusMessage::completed());
        canned.answers.insert(
            "/poly/eval",
            StatusMessage::failure(ResultKind::UncaughtException, Stage::TestBody, 0, "bad degree"),
        );

        let mut spawner = Spawner::new(canned, Recording::default());
        let summary = spawner.run(&root).unwrap();
        assert_eq!((summary.total, summary.passed, summary.failed), (3, 1, 2));

        let reporter = spawner.into_reporter();
        assert_eq!(
            reporter.completed,
            vec![
                ("/linalg/det".to_string(), true),
                ("/linalg/singular".to_string(), false),
                ("/poly/eval".to_string(), false),
            ]
        );
        assert_eq!(reporter.summary.map(|s| s.total), Some(3));
    }

    #[test]
    fn test_only_scheduled_cases_are_launched() {
        let mut root = registry();
        root.set_scheduled("/", false).unwrap();
        root.set_scheduled("/poly", true).unwrap();

        let mut canned = Canned::default();
        canned.answers.insert("/poly/eval", StatusMessage::completed());
        let mut spawner = Spawner::new(canned, Recording::default());
        let summary = spawner.run(&root).unwrap();
        assert_eq!((summary.total, summary.passed), (1, 1));
    }

    #[test]
    fn test_nothing_scheduled() {
        let mut root = registry();
        root.set_scheduled("/", false).unwrap();
        let mut spawner = Spawner::new(Canned::default(), Recording::default());
        let summary = spawner.run(&root).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate(), None);
    }

    #[test]
    fn test_corrupt_report_aborts_run() {
        let root = registry();
        let mut spawner = Spawner::new(Canned::default(), Recording::default());
        let err = spawner.run(&root).unwrap_err();
        assert!(matches!(err, SpawnError::Protocol { ref path, .. } if path == "/linalg/det"));
    }
}
