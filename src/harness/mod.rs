//! Two-process test execution.
//!
//! The same executable plays two roles:
//!
//! - **spawner** (parent): walks the scheduled tests and, for each, launches a child re-invoking this executable
//!   with a schedule that selects only that test. It reads the child's status report from the child's standard
//!   output, compares it with the test's expectation, and prints a summary.
//! - **runner** (child, `--runner`): installs the fault handler, runs the one scheduled test through its
//!   lifecycle, and writes one status report.
//!
//! Children run strictly one after another. A crash in one test can only ever take down its own process.

pub mod launcher;
pub mod reporter;
pub mod runner;
pub mod spawner;

pub use launcher::{ChildLauncher, ProcessLauncher, SpawnError};
pub use reporter::{CaseOutcome, ConsoleReporter, RunSummary, TestReporter};
pub use runner::{RunnerError, run_case, run_child, run_scheduled};
pub use spawner::Spawner;
