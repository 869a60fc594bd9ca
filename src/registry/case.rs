//! Registered test cases and the code they run.

use std::any::Any;
use std::fmt;

use forkcase_core::ExpectedOutcome;

use crate::context::Context;

/// Body of a function-style test case.
pub type TestFn = Box<dyn Fn(&Context<'_>) -> miette::Result<()>>;

/// Builds a fresh fixture for one run of a fixture-style test case.
pub type FixtureFactory = Box<dyn Fn() -> Box<dyn Fixture>>;

/// A test with setup and teardown phases.
///
/// The runner calls [`Fixture::initialize`], then [`Fixture::run`] if initialization succeeded, then always
/// [`Fixture::shutdown`]. Returning `Err` (or panicking) from any phase is reported as an uncaught exception in
/// that phase.
pub trait Fixture {
    fn initialize(&mut self, _ctx: &Context<'_>) -> miette::Result<()> {
        Ok(())
    }

    fn run(&mut self, ctx: &Context<'_>) -> miette::Result<()>;

    fn shutdown(&mut self, _ctx: &Context<'_>) -> miette::Result<()> {
        Ok(())
    }
}

/// What a test case executes.
pub enum Runnable {
    /// Body only: no initialize or shutdown phase.
    Function(TestFn),
    /// Full initialize / body / shutdown lifecycle on a freshly built fixture.
    Fixture(FixtureFactory),
}

impl Runnable {
    pub fn function<F>(body: F) -> Self
    where
        F: Fn(&Context<'_>) -> miette::Result<()> + 'static,
    {
        Runnable::Function(Box::new(body))
    }

    /// Fixture-style runnable built with `T::default()` for every run.
    pub fn fixture<T>() -> Self
    where
        T: Fixture + Default + 'static,
    {
        Runnable::fixture_with(|| Box::new(T::default()))
    }

    pub fn fixture_with<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Fixture> + 'static,
    {
        Runnable::Fixture(Box::new(factory))
    }

    pub fn has_lifecycle(&self) -> bool {
        matches!(self, Runnable::Fixture(_))
    }
}

impl fmt::Debug for Runnable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runnable::Function(_) => f.write_str("Runnable::Function"),
            Runnable::Fixture(_) => f.write_str("Runnable::Fixture"),
        }
    }
}

/// One registered test.
pub struct TestCase {
    runnable: Runnable,
    expected: ExpectedOutcome,
    data: Option<Box<dyn Any>>,
    pub(crate) scheduled: bool,
}

impl TestCase {
    pub(crate) fn new(runnable: Runnable, expected: ExpectedOutcome, data: Option<Box<dyn Any>>) -> Self {
        Self {
            runnable,
            expected,
            data,
            scheduled: true,
        }
    }

    pub fn runnable(&self) -> &Runnable {
        &self.runnable
    }

    pub fn expected(&self) -> ExpectedOutcome {
        self.expected
    }

    pub fn data(&self) -> Option<&dyn Any> {
        self.data.as_deref()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("runnable", &self.runnable)
            .field("expected", &self.expected)
            .field("has_data", &self.data.is_some())
            .field("scheduled", &self.scheduled)
            .finish()
    }
}
