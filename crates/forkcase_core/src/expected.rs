//! Expected outcome declared by a registered test.

use std::fmt;

use thiserror::Error;

use crate::outcome::{ResultKind, Stage};

/// Reasons an expected outcome cannot be declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeError {
    #[error("{0} is never a legal expectation")]
    IllegalResult(ResultKind),

    #[error("{result} cannot be expected during {stage}; use STAGE_INITIALIZE, STAGE_TEST_BODY or STAGE_SHUTDOWN")]
    IllegalStage { result: ResultKind, stage: Stage },

    #[error("RESULT_NO_ERROR must be expected as STAGE_COMPLETED with signal 0, got {stage} with signal {signal}")]
    IllegalCompletion { stage: Stage, signal: i32 },

    #[error("RESULT_CAUGHT_SIGNAL requires a positive signal number, got {0}")]
    MissingSignal(i32),

    #[error("{0} cannot carry a signal number")]
    UnexpectedSignal(ResultKind),
}

/// The `(result, stage, signal)` triple a test is expected to end with.
///
/// ## Notes
/// - `signal` is non-zero iff `result` is [`ResultKind::CaughtSignal`].
/// - Failure expectations are limited to the stages that run caller code (see [`Stage::is_failure_stage`]).
/// - [`ResultKind::NoError`] is only legal as `STAGE_COMPLETED` with signal 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpectedOutcome {
    pub result: ResultKind,
    pub stage: Stage,
    pub signal: i32,
}

impl ExpectedOutcome {
    /// Expect the lifecycle to complete normally.
    pub const fn no_error() -> Self {
        Self {
            result: ResultKind::NoError,
            stage: Stage::Completed,
            signal: 0,
        }
    }

    /// Expect `signal` to be raised while `stage` runs.
    pub const fn caught_signal(signal: i32, stage: Stage) -> Self {
        Self {
            result: ResultKind::CaughtSignal,
            stage,
            signal,
        }
    }

    /// Expect a software error to escape `stage`.
    pub const fn uncaught_exception(stage: Stage) -> Self {
        Self {
            result: ResultKind::UncaughtException,
            stage,
            signal: 0,
        }
    }

    /// Check the triple against the declaration rules.
    ///
    /// ## Errors
    /// - [`OutcomeError`] naming the first rule the triple breaks.
    pub fn validate(&self) -> Result<(), OutcomeError> {
        match self.result {
            ResultKind::NoError => {
                if self.stage != Stage::Completed || self.signal != 0 {
                    return Err(OutcomeError::IllegalCompletion {
                        stage: self.stage,
                        signal: self.signal,
                    });
                }
            }
            ResultKind::CaughtSignal => {
                if self.signal <= 0 {
                    return Err(OutcomeError::MissingSignal(self.signal));
                }
                if !self.stage.is_failure_stage() {
                    return Err(OutcomeError::IllegalStage {
                        result: self.result,
                        stage: self.stage,
                    });
                }
            }
            ResultKind::UncaughtException => {
                if self.signal != 0 {
                    return Err(OutcomeError::UnexpectedSignal(self.result));
                }
                if !self.stage.is_failure_stage() {
                    return Err(OutcomeError::IllegalStage {
                        result: self.result,
                        stage: self.stage,
                    });
                }
            }
            ResultKind::UnspecifiedFailure => return Err(OutcomeError::IllegalResult(self.result)),
        }
        Ok(())
    }

    /// Whether an observed triple satisfies this expectation exactly.
    pub fn matches(&self, result: ResultKind, stage: Stage, signal: i32) -> bool {
        self.result == result && self.stage == stage && self.signal == signal
    }
}

impl Default for ExpectedOutcome {
    fn default() -> Self {
        Self::no_error()
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} during {} with signal {}", self.result, self.stage, self.signal)
    }
}
