//! Forkcase self-test suite.
//!
//! Registers a small suite that exercises every outcome the harness can observe, including deliberate mismatches
//! under `/mismatch`. A plain run therefore exits non-zero; select subtrees with `-r / -a PATH`.

use forkcase::{Context, Directory, ExpectedOutcome, Fixture, Runnable, Stage, require};
use miette::miette;

/// Fixture that optionally dies with `SIGFPE` during one of its phases.
#[derive(Default)]
struct Singular {
    raise_during: Option<Stage>,
    rows: Vec<u32>,
}

impl Fixture for Singular {
    fn initialize(&mut self, _ctx: &Context<'_>) -> miette::Result<()> {
        if self.raise_during == Some(Stage::Initialize) {
            // SAFETY: raising a signal has no memory-safety preconditions.
            unsafe {
                libc::raise(libc::SIGFPE);
            }
        }
        self.rows = vec![1, 2, 4];
        Ok(())
    }

    fn run(&mut self, _ctx: &Context<'_>) -> miette::Result<()> {
        require!(self.rows.len() == 3, "expected 3 rows, got {}", self.rows.len());
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &Context<'_>) -> miette::Result<()> {
        self.rows.clear();
        if self.raise_during == Some(Stage::Shutdown) {
            // SAFETY: as in `initialize`.
            unsafe {
                libc::raise(libc::SIGFPE);
            }
        }
        Ok(())
    }
}

fn singular(raise_during: Stage) -> Runnable {
    Runnable::fixture_with(move || {
        Box::new(Singular {
            raise_during: Some(raise_during),
            ..Singular::default()
        })
    })
}

/// Recurse until the stack guard page is hit. The frame stays live across the call, so this is not a tail call.
#[inline(never)]
#[allow(unconditional_recursion)]
fn descend(depth: usize) -> usize {
    let frame = std::hint::black_box([depth as u8; 4096]);
    descend(depth + 1) + usize::from(frame[depth % frame.len()])
}

fn sum_payload(ctx: &Context<'_>) -> miette::Result<()> {
    let [a, b] = ctx.data::<[usize; 2]>().ok_or_else(|| miette!("missing payload for {}", ctx.path()))?;
    require!(a + b == 5, "{a} + {b} != 5");
    Ok(())
}

fn build() -> Directory {
    let mut root = Directory::root();

    // Outcomes that match their expectation.
    root.register_fn(&["pass", "trivial"], |_| Ok(()));
    root.register_fn(&["pass", "require"], |ctx| {
        require!(ctx.name() == "require");
        Ok(())
    });
    root.register(
        &["pass", "payload"],
        Runnable::function(sum_payload),
        ExpectedOutcome::no_error(),
        Some(Box::new([2usize, 3])),
    );
    root.register(&["pass", "fixture"], Runnable::fixture::<Singular>(), ExpectedOutcome::no_error(), None);
    root.register(
        &["pass", "expected_error"],
        Runnable::function(|_| Err(miette!("rank deficient"))),
        ExpectedOutcome::uncaught_exception(Stage::TestBody),
        None,
    );
    root.register(
        &["pass", "expected_panic"],
        Runnable::function(|_| panic!("index out of range")),
        ExpectedOutcome::uncaught_exception(Stage::TestBody),
        None,
    );
    root.register(
        &["signal", "initialize_fpe"],
        singular(Stage::Initialize),
        ExpectedOutcome::caught_signal(libc::SIGFPE, Stage::Initialize),
        None,
    );
    root.register(
        &["signal", "shutdown_fpe"],
        singular(Stage::Shutdown),
        ExpectedOutcome::caught_signal(libc::SIGFPE, Stage::Shutdown),
        None,
    );
    root.register(
        &["signal", "failed_require"],
        Runnable::function(|_| {
            require!(1 + 1 == 3);
            Ok(())
        }),
        ExpectedOutcome::caught_signal(libc::SIGABRT, Stage::TestBody),
        None,
    );
    root.register(
        &["signal", "stack_overflow"],
        Runnable::function(|_| {
            std::hint::black_box(descend(0));
            Ok(())
        }),
        ExpectedOutcome::caught_signal(libc::SIGSEGV, Stage::TestBody),
        None,
    );

    // Outcomes that deliberately miss their expectation.
    root.register_fn(&["mismatch", "body_error"], |_| {
        Err(miette!("matrix is singular"))
    });
    root.register(
        &["mismatch", "quiet_shutdown"],
        Runnable::fixture::<Singular>(),
        ExpectedOutcome::caught_signal(libc::SIGFPE, Stage::Shutdown),
        None,
    );

    // A subtree for schedule editing.
    root.register_fn(&["foo", "alpha"], |_| Ok(()));
    root.register_fn(&["foo", "nested", "beta"], |_| Ok(()));
    root.register_fn(&["bar", "gamma"], |_| Ok(()));

    root
}

fn main() {
    forkcase::cli::run(build());
}
