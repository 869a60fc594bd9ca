//! Command-line interface shared by every forkcase test executable.
//!
//! A test executable builds its registry and hands it to [`run`]. The flags choose what happens next:
//!
//! - `-p/--print-all` - list the scheduled tests and exit
//! - `-a/--add PATH`, `-r/--remove PATH` - edit the schedule, applied in command-line order
//! - `-d/--debug` - verbose internal diagnostics on standard error
//! - `--timeout SECONDS` - kill children that do not report in time; must be at least 1
//!
//! Without `--runner` the process is the spawner; with it (set by the spawner on its children) the process is a
//! runner.
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod schedule;

use std::ffi::OsString;
use std::fmt;
use std::process;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser};
use tracing_subscriber::EnvFilter;

use crate::registry::Directory;
use crate::state;
use schedule::ScheduleOp;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);

    /// Exit code carrying a failure count, saturating at 255.
    pub fn from_failures(failures: usize) -> Self {
        ExitCode(failures.min(255) as i32)
    }
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run registered tests, each in its own child process
#[derive(Parser, Debug)]
#[command(name = "forkcase")]
#[command(version)]
#[command(about = "Run registered tests, each in its own child process", long_about = None)]
pub struct Cli {
    /// Print the scheduled tests and exit
    #[arg(short = 'p', long = "print-all")]
    pub print_all: bool,

    /// Schedule the test or subtree at PATH (`/` schedules everything)
    #[arg(short = 'a', long = "add", value_name = "PATH")]
    pub add: Vec<String>,

    /// Unschedule the test or subtree at PATH
    #[arg(short = 'r', long = "remove", value_name = "PATH")]
    pub remove: Vec<String>,

    /// Verbose internal diagnostics on standard error
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Kill a test's child process if it has not reported after SECONDS
    #[arg(long = "timeout", value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Run the scheduled tests in this process and report over the status protocol
    #[arg(long = "runner", hide = true)]
    pub runner: bool,
}

impl Cli {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// A parsed command line: the flags plus the schedule edits in the order given.
#[derive(Debug)]
pub struct Invocation {
    pub cli: Cli,
    pub schedule: Vec<ScheduleOp>,
}

/// Parse a command line.
pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let schedule = schedule::ordered_ops(&matches);
    let cli = Cli::from_arg_matches(&matches)?;
    Ok(Invocation { cli, schedule })
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main entry point for a test executable.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run(mut root: Directory) {
    let invocation = match parse_from(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(e) => {
            // Help and version go to stdout and are not failures.
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            let _ = e.print();
            process::exit(code.0);
        }
    };

    init_logging(invocation.cli.debug);

    match execute(&mut root, invocation) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Structured logging on standard error; `--debug` overrides `RUST_LOG`.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute a parsed command line against `root` and return the exit code.
pub fn execute(root: &mut Directory, invocation: Invocation) -> CliResult<ExitCode> {
    let Invocation { cli, schedule } = invocation;
    state::set_debug(cli.debug);

    schedule::apply(root, &schedule).map_err(|e| CliError::failure(format!("{:?}", miette::Report::new(e))))?;

    if cli.print_all {
        return commands::print_scheduled(root);
    }
    if cli.runner {
        return commands::run_child(root);
    }
    commands::run_spawner(root, cli.debug, cli.timeout())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_flags() {
        let invocation = parse_from(["suite", "-p", "-d", "--timeout", "30"]).unwrap();
        assert!(invocation.cli.print_all);
        assert!(invocation.cli.debug);
        assert!(!invocation.cli.runner);
        assert_eq!(invocation.cli.timeout(), Some(Duration::from_secs(30)));
        assert!(invocation.schedule.is_empty());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse_from(["suite", "--timeout", "0"]).unwrap_err();
        assert!(err.use_stderr());
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let invocation = parse_from(["suite", "--timeout", "1"]).unwrap();
        assert_eq!(invocation.cli.timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_cli_parse_long_forms() {
        let invocation = parse_from(["suite", "--remove", "/", "--add", "/tensor", "--print-all"]).unwrap();
        assert_eq!(
            invocation.schedule,
            vec![ScheduleOp::Remove("/".into()), ScheduleOp::Add("/tensor".into())]
        );
    }

    #[test]
    fn test_cli_parse_runner() {
        let invocation = parse_from(["suite", "--runner", "-r", "/", "-a", "/x"]).unwrap();
        assert!(invocation.cli.runner);
        assert_eq!(invocation.schedule.len(), 2);
    }

    #[test]
    fn test_runner_flag_hidden_from_help() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("--print-all"));
        assert!(!help.contains("--runner"));
    }

    #[test]
    fn test_help_is_not_an_error() {
        let err = parse_from(["suite", "-h"]).unwrap_err();
        assert!(!err.use_stderr());
        let err = parse_from(["suite", "--bogus"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_exit_code_saturates() {
        assert_eq!(ExitCode::from_failures(0), ExitCode::SUCCESS);
        assert_eq!(ExitCode::from_failures(3), ExitCode(3));
        assert_eq!(ExitCode::from_failures(256), ExitCode(255));
    }

    #[test]
    fn test_invalid_schedule_path_is_cli_failure() {
        let mut root = Directory::root();
        root.register_fn(&["ok"], |_| Ok(()));
        let invocation = parse_from(["suite", "-a", "/missing", "-p"]).unwrap();
        let err = execute(&mut root, invocation).unwrap_err();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("invalid test path '/missing'"));
    }
}
