//! Provide the outcome vocabulary shared by every forkcase process.
//!
//! A test run ends in exactly one [`ResultKind`], observed at one [`Stage`] of the test's lifecycle. Both are
//! exchanged between the runner (child) and spawner (parent) as small integers, and rendered for humans with their
//! canonical `STAGE_*` / `RESULT_*` spellings.
//!
//! ## Notes
//!
//! - This is a “semantic core” crate: **no IO**, no global state, no OS access.
//! - [`ExpectedOutcome`] is the only type with rules attached: it validates the combinations a test may legally
//!   declare before it is registered.

pub mod expected;
pub mod outcome;

pub use expected::{ExpectedOutcome, OutcomeError};
pub use outcome::{ResultKind, Stage};
