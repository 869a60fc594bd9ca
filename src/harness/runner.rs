//! Child-side executor: run scheduled test cases in this process and report each one.
//!
//! ## Lifecycle
//!
//! Function-style cases: `PRE_INITIALIZE → TEST_BODY → COMPLETED`.
//!
//! Fixture-style cases: `PRE_INITIALIZE → INITIALIZE → POST_INITIALIZE → TEST_BODY → POST_TEST_BODY → SHUTDOWN →
//! COMPLETED`. A failed initialize skips the body; shutdown always runs; the first failure is the one reported.
//!
//! The process-wide stage is updated *before* each phase starts, so a signal raised inside a phase is attributed
//! to that phase by the fault handler.

use std::any::Any;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use forkcase_core::{ResultKind, Stage};
use thiserror::Error;

use crate::channel::StatusChannel;
use crate::context::Context;
use crate::protocol::{self, StatusMessage};
use crate::registry::{Directory, FixtureFactory, Runnable, ScheduledCase};
use crate::{fault, state};

/// Errors that stop the runner from reporting at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to install the fault handler: {0}")]
    InstallHandler(#[source] io::Error),

    #[error("failed to set up the status channel: {0}")]
    Channel(#[source] io::Error),

    #[error("failed to write status for {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Run every scheduled test as a child process would.
///
/// Installs the fault handler, isolates the status channel from standard output, then runs and reports each
/// scheduled case in listing order.
///
/// ## Returns
/// - The number of cases whose outcome did not match their expectation.
pub fn run_child(root: &Directory) -> Result<usize, RunnerError> {
    fault::install().map_err(RunnerError::InstallHandler)?;
    let mut channel = StatusChannel::isolate().map_err(RunnerError::Channel)?;
    run_scheduled(root, &mut channel)
}

/// Run the scheduled cases of `root`, writing one status report per case to `channel`.
pub fn run_scheduled<W: Write + ?Sized>(root: &Directory, channel: &mut W) -> Result<usize, RunnerError> {
    let mut failures = 0;
    for scheduled in root.scheduled_cases() {
        let status = run_case(&scheduled);
        protocol::write_status(channel, &status).map_err(|source| RunnerError::Report {
            path: scheduled.path.clone(),
            source,
        })?;
        if !scheduled
            .case
            .expected()
            .matches(status.result, status.stage, status.signal)
        {
            failures += 1;
        }
    }
    Ok(failures)
}

/// Execute one case's lifecycle and build its status report.
pub fn run_case(scheduled: &ScheduledCase<'_>) -> StatusMessage {
    let ctx = Context::new(scheduled.name, scheduled.directory, scheduled.case.data());
    state::set_stage(Stage::PreInitialize);
    tracing::debug!(
        path = %scheduled.path,
        lifecycle = scheduled.case.runnable().has_lifecycle(),
        "running test case"
    );

    let status = match scheduled.case.runnable() {
        Runnable::Function(body) => {
            state::set_stage(Stage::TestBody);
            match run_phase(|| body(&ctx)) {
                Ok(()) => completed(),
                Err(message) => uncaught(Stage::TestBody, message),
            }
        }
        Runnable::Fixture(factory) => run_fixture(factory, &ctx),
    };

    tracing::debug!(
        path = %scheduled.path,
        result = %status.result,
        stage = %status.stage,
        "test case finished"
    );
    status
}

fn run_fixture(factory: &FixtureFactory, ctx: &Context<'_>) -> StatusMessage {
    state::set_stage(Stage::Initialize);
    let mut fixture = match run_phase(|| Ok(factory())) {
        Ok(fixture) => fixture,
        // Nothing was built, so there is nothing to shut down.
        Err(message) => return uncaught(Stage::Initialize, message),
    };

    let mut failure = run_phase(|| fixture.initialize(ctx))
        .err()
        .map(|message| (Stage::Initialize, message));
    state::set_stage(Stage::PostInitialize);

    if failure.is_none() {
        state::set_stage(Stage::TestBody);
        failure = run_phase(|| fixture.run(ctx))
            .err()
            .map(|message| (Stage::TestBody, message));
        state::set_stage(Stage::PostTestBody);
    }

    state::set_stage(Stage::Shutdown);
    if let Err(message) = run_phase(|| fixture.shutdown(ctx)) {
        if failure.is_none() {
            failure = Some((Stage::Shutdown, message));
        } else {
            tracing::debug!(%message, "shutdown failed after an earlier failure; keeping the first");
        }
    }

    match failure {
        Some((stage, message)) => uncaught(stage, message),
        None => completed(),
    }
}

/// Run one phase, converting an `Err` or a panic into its message.
fn run_phase<T>(phase: impl FnOnce() -> miette::Result<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(phase)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(report)) => Err(report_message(&report)),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn report_message(report: &miette::Report) -> String {
    report.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(": ")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked with a non-string payload".to_string()
    }
}

fn completed() -> StatusMessage {
    state::set_stage(Stage::Completed);
    StatusMessage::completed()
}

fn uncaught(stage: Stage, message: String) -> StatusMessage {
    StatusMessage::failure(ResultKind::UncaughtException, stage, 0, message)
}
