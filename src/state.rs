//! Process-wide state shared with the fault handler.
//!
//! A signal handler cannot be handed arguments, so the few values it needs live here: the lifecycle stage the
//! runner is in, a diagnostic staged ahead of a deliberate abort, the descriptor the status protocol writes to,
//! and the debug flag.
//!
//! ## Notes
//! - Each process runs tests on a single thread; these values are only written by that thread. Atomics and the
//!   non-blocking `try_lock` below keep the handler from tearing a value or deadlocking, not to support
//!   concurrent runners.
//! - Nothing else in the crate keeps global state.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use forkcase_core::Stage;

struct ProcessState {
    stage: AtomicU8,
    premade_message: Mutex<Option<String>>,
    status_fd: AtomicI32,
    debug: AtomicBool,
}

static STATE: ProcessState = ProcessState {
    stage: AtomicU8::new(Stage::PreInitialize.code()),
    premade_message: Mutex::new(None),
    status_fd: AtomicI32::new(libc::STDOUT_FILENO),
    debug: AtomicBool::new(false),
};

/// Record the stage the runner is about to enter.
pub fn set_stage(stage: Stage) {
    STATE.stage.store(stage.code(), Ordering::SeqCst);
}

pub fn current_stage() -> Stage {
    Stage::from_code(STATE.stage.load(Ordering::SeqCst)).unwrap_or(Stage::PreInitialize)
}

/// Stage a diagnostic for the fault handler to report instead of a synthesized call stack.
pub fn stage_premade_message(message: String) {
    match STATE.premade_message.lock() {
        Ok(mut slot) => *slot = Some(message),
        Err(poisoned) => *poisoned.into_inner() = Some(message),
    }
}

/// Take the staged diagnostic, if any.
///
/// Never blocks: if the slot is held elsewhere the message is treated as absent.
pub fn take_premade_message() -> Option<String> {
    STATE.premade_message.try_lock().ok().and_then(|mut slot| slot.take())
}

/// Descriptor the status protocol is written to.
pub fn status_fd() -> i32 {
    STATE.status_fd.load(Ordering::SeqCst)
}

pub fn set_status_fd(fd: i32) {
    STATE.status_fd.store(fd, Ordering::SeqCst);
}

pub fn debug_enabled() -> bool {
    STATE.debug.load(Ordering::Relaxed)
}

pub fn set_debug(enabled: bool) {
    STATE.debug.store(enabled, Ordering::Relaxed);
}
