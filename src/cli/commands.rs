//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io::{self, Write};
use std::time::Duration;

use crate::harness::{self, ConsoleReporter, ProcessLauncher, Spawner};
use crate::registry::Directory;

use super::{CliError, CliResult, ExitCode};

/// `-p`: list the scheduled tests on standard output.
pub fn print_scheduled(root: &Directory) -> CliResult<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    root.print(&mut out)
        .and_then(|()| out.flush())
        .map_err(|e| CliError::failure(format!("failed to print tests: {e}")))?;
    Ok(ExitCode::SUCCESS)
}

/// `--runner`: run the scheduled tests in this process.
///
/// Exits with 1 if any test did not meet its expectation. The parent reads the
/// verdict from the status report, so the exit code is informational.
pub fn run_child(root: &Directory) -> CliResult<ExitCode> {
    let failures = harness::run_child(root).map_err(|e| CliError::failure(e.to_string()))?;
    if failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Default mode: one child process per scheduled test.
///
/// ## Returns
/// - The number of mismatching tests as the exit code (saturating at 255).
pub fn run_spawner(root: &Directory, debug: bool, timeout: Option<Duration>) -> CliResult<ExitCode> {
    let launcher = ProcessLauncher::current_exe(debug, timeout).map_err(|e| CliError::failure(e.to_string()))?;
    let mut spawner = Spawner::new(launcher, ConsoleReporter::new(debug));
    let summary = spawner.run(root).map_err(|e| CliError::failure(e.to_string()))?;
    tracing::debug!(total = summary.total, failed = summary.failed, "spawner finished");
    Ok(ExitCode::from_failures(summary.failed))
}
