//! Lifecycle stages and terminal results.

use std::fmt;

/// Lifecycle phase reached when an outcome was recorded.
///
/// Fixture-style cases move through every stage in declaration order. Function-style cases jump from
/// [`Stage::PreInitialize`] straight to [`Stage::TestBody`] and then [`Stage::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    PreInitialize,
    Initialize,
    PostInitialize,
    TestBody,
    PostTestBody,
    Shutdown,
    Completed,
}

impl Stage {
    /// All stages in lifecycle order.
    pub const ALL: [Stage; 7] = [
        Stage::PreInitialize,
        Stage::Initialize,
        Stage::PostInitialize,
        Stage::TestBody,
        Stage::PostTestBody,
        Stage::Shutdown,
        Stage::Completed,
    ];

    /// Integer used on the wire.
    pub const fn code(self) -> u8 {
        match self {
            Stage::PreInitialize => 0,
            Stage::Initialize => 1,
            Stage::PostInitialize => 2,
            Stage::TestBody => 3,
            Stage::PostTestBody => 4,
            Stage::Shutdown => 5,
            Stage::Completed => 6,
        }
    }

    /// Inverse of [`Stage::code`].
    pub const fn from_code(code: u8) -> Option<Stage> {
        match code {
            0 => Some(Stage::PreInitialize),
            1 => Some(Stage::Initialize),
            2 => Some(Stage::PostInitialize),
            3 => Some(Stage::TestBody),
            4 => Some(Stage::PostTestBody),
            5 => Some(Stage::Shutdown),
            6 => Some(Stage::Completed),
            _ => None,
        }
    }

    /// Canonical spelling used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::PreInitialize => "STAGE_PRE_INITIALIZE",
            Stage::Initialize => "STAGE_INITIALIZE",
            Stage::PostInitialize => "STAGE_POST_INITIALIZE",
            Stage::TestBody => "STAGE_TEST_BODY",
            Stage::PostTestBody => "STAGE_POST_TEST_BODY",
            Stage::Shutdown => "STAGE_SHUTDOWN",
            Stage::Completed => "STAGE_COMPLETED",
        }
    }

    /// Whether a failure may legally be expected in this stage.
    ///
    /// Only the three phases that run caller code qualify.
    pub const fn is_failure_stage(self) -> bool {
        matches!(self, Stage::Initialize | Stage::TestBody | Stage::Shutdown)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultKind {
    /// The lifecycle reached [`Stage::Completed`].
    NoError,
    /// A fatal signal was intercepted by the fault handler.
    CaughtSignal,
    /// A software error (an `Err` or a panic) escaped a lifecycle phase.
    UncaughtException,
    /// Placeholder for failures that fit no other kind; never a legal expectation.
    UnspecifiedFailure,
}

impl ResultKind {
    pub const ALL: [ResultKind; 4] = [
        ResultKind::NoError,
        ResultKind::CaughtSignal,
        ResultKind::UncaughtException,
        ResultKind::UnspecifiedFailure,
    ];

    /// Integer used on the wire.
    pub const fn code(self) -> u8 {
        match self {
            ResultKind::NoError => 0,
            ResultKind::CaughtSignal => 1,
            ResultKind::UncaughtException => 2,
            ResultKind::UnspecifiedFailure => 3,
        }
    }

    /// Inverse of [`ResultKind::code`].
    pub const fn from_code(code: u8) -> Option<ResultKind> {
        match code {
            0 => Some(ResultKind::NoError),
            1 => Some(ResultKind::CaughtSignal),
            2 => Some(ResultKind::UncaughtException),
            3 => Some(ResultKind::UnspecifiedFailure),
            _ => None,
        }
    }

    /// Canonical spelling used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            ResultKind::NoError => "RESULT_NO_ERROR",
            ResultKind::CaughtSignal => "RESULT_CAUGHT_SIGNAL",
            ResultKind::UncaughtException => "RESULT_UNCAUGHT_EXCEPTION",
            ResultKind::UnspecifiedFailure => "RESULT_UNSPECIFIED_FAILURE",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
