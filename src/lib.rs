#![deny(unsafe_code)]
//! Forkcase: a forking test harness.
//!
//! Tests live in a hierarchical registry of directories addressed by `/`-separated paths. A spawner process runs
//! every scheduled test in its own child process, so a test that crashes with a fatal signal is observed and
//! reported instead of taking the whole suite down. The child reports a structured status (result, lifecycle stage,
//! signal number, message) over a small line-oriented protocol.
//!
//! ```no_run
//! use forkcase::{Directory, ExpectedOutcome, Runnable};
//!
//! let mut root = Directory::root();
//! root.register_fn(&["math", "add"], |_| {
//!     forkcase::require!(1 + 1 == 2);
//!     Ok(())
//! });
//! root.register(
//!     &["math", "crash"],
//!     Runnable::function(|_| unsafe {
//!         libc::raise(libc::SIGSEGV);
//!         Ok(())
//!     }),
//!     ExpectedOutcome::caught_signal(libc::SIGSEGV, forkcase::Stage::TestBody),
//!     None,
//! );
//! forkcase::cli::run(root);
//! ```
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Registration**: `register` and `subdirectory` panic on a malformed registration. Registries are built at
//!   startup from literals, and a bad one is a bug in the test suite. `try_register` and `try_subdirectory` return
//!   the error instead.
//!
//! - **Unsafe**: denied crate-wide; only the signal handler and the status channel opt back in.

pub mod channel;
pub mod cli;
pub mod context;
pub mod diagnostics;
pub mod fault;
pub mod harness;
pub mod protocol;
pub mod registry;
pub mod state;

pub use context::Context;
pub use forkcase_core::{ExpectedOutcome, ResultKind, Stage};
pub use registry::{Directory, Fixture, Runnable, TestCase};
