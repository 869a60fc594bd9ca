//! Fault handler: report a fatal signal before the process dies of it.
//!
//! This is a deliberate escape hatch outside normal control flow. The runner installs [`install`] once, before
//! any test executes. When one of [`HANDLED_SIGNALS`] arrives, the handler
//!
//! 1. takes the diagnostic staged by [`fail_assertion`], or captures a call stack,
//! 2. writes a `RESULT_CAUGHT_SIGNAL` status carrying the current stage and the signal number,
//! 3. re-raises the signal, which now has its default disposition (`SA_RESETHAND`), so the process still dies of
//!    it and any supervisor sees the real exit status.
//!
//! Software errors never come through here; the runner turns those into status reports itself.

#![allow(unsafe_code)]

use std::io::{self, Write};
use std::panic::Location;

use forkcase_core::ResultKind;
use libc::c_int;

use crate::channel::StatusChannel;
use crate::protocol::{self, StatusMessage};
use crate::{diagnostics, state};

/// Signals intercepted by the fault handler.
///
/// `SIGKILL` and `SIGSTOP` cannot be caught; the remaining signals are not crashes worth reporting.
pub const HANDLED_SIGNALS: [c_int; 7] = [
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGABRT,
    libc::SIGFPE,
    libc::SIGSEGV,
    libc::SIGTERM,
];

/// Frames between the handler and the faulting code: the kernel's signal trampoline and libc's `raise`.
const TRAMPOLINE_FRAMES: &[&str] = &[
    "<unknown>",
    "__restore_rt",
    "raise",
    "gsignal",
    "__GI_raise",
    "pthread_kill",
    "__pthread_kill",
    "__GI___pthread_kill",
    "__pthread_kill_implementation",
    "__pthread_kill_internal",
    "killpg",
];

/// Size of the handler's alternate stack.
///
/// Capturing and symbolizing a backtrace needs far more than `SIGSTKSZ`, and a stack overflow leaves nothing of
/// the regular stack to run on.
const ALT_STACK_SIZE: usize = 2 << 20;

/// Install the one-shot handler for every signal in [`HANDLED_SIGNALS`].
///
/// The handler runs on a dedicated alternate stack of the calling thread, so a test that overflows its stack is
/// still reported. Tests run on the thread that called `install`.
///
/// ## Errors
/// - The OS error from `mmap`, `sigaltstack` or `sigaction`; handlers installed before the failure stay in place.
pub fn install() -> io::Result<()> {
    install_alt_stack()?;
    for signal in HANDLED_SIGNALS {
        // SAFETY: `action` is fully initialized (zeroed, then mask and handler set) before `sigaction` reads it,
        // and `handle_signal` has the `extern "C" fn(c_int)` shape a non-SA_SIGINFO handler requires.
        let rc = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = libc::SA_RESETHAND | libc::SA_NODEFER | libc::SA_ONSTACK;
            action.sa_sigaction = handle_signal as extern "C" fn(c_int) as libc::sighandler_t;
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    tracing::debug!(signals = ?HANDLED_SIGNALS, "fault handler installed");
    Ok(())
}

/// Map a guarded region and make it this thread's signal stack.
///
/// The mapping is never released: it must outlive every signal the process can still receive.
fn install_alt_stack() -> io::Result<()> {
    // SAFETY: `sysconf` has no preconditions.
    let page = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    };
    let size = ALT_STACK_SIZE.max(libc::SIGSTKSZ);

    // SAFETY: anonymous private mapping with no address hint; the result is checked before use.
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            page + size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    // The lowest page stays inaccessible so an overflow of the alternate stack faults instead of corrupting memory.
    // SAFETY: `base` is the start of a mapping at least one page long.
    if unsafe { libc::mprotect(base, page, libc::PROT_NONE) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `stack` is fully initialized and describes the writable part of the mapping above the guard page.
    let rc = unsafe {
        let mut stack: libc::stack_t = std::mem::zeroed();
        stack.ss_sp = base.cast::<u8>().add(page).cast();
        stack.ss_size = size;
        stack.ss_flags = 0;
        libc::sigaltstack(&stack, std::ptr::null_mut())
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    tracing::debug!(size, "alternate signal stack installed");
    Ok(())
}

#[inline(never)]
extern "C" fn handle_signal(signal: c_int) {
    // Captured here rather than in a closure so that this frame is the boundary of the reported stack.
    let message = match state::take_premade_message() {
        Some(message) => message,
        None => {
            let stack = diagnostics::call_stack_after("forkcase::fault::handle_signal", TRAMPOLINE_FRAMES);
            format!("caught {}\n{stack}", signal_name(signal))
        }
    };
    let status = StatusMessage::failure(ResultKind::CaughtSignal, state::current_stage(), signal, message);

    if state::debug_enabled() {
        // The tracing subscriber may hold locks the interrupted code owns; go straight to fd 2.
        let note = format!("fault handler: caught {} during {}\n", signal_name(signal), status.stage);
        // SAFETY: `note` is a valid, initialized buffer for its whole length.
        unsafe {
            libc::write(libc::STDERR_FILENO, note.as_ptr().cast(), note.len());
        }
    }

    // Nothing useful can be done about a failed write while dying.
    let _ = StatusChannel::current().write_all(&protocol::encode(&status));

    // SAFETY: `raise` only delivers a signal; the disposition was reset to default on entry.
    unsafe {
        libc::raise(signal);
    }
}

/// Fail the running test with `description`, through the same path as a crash.
///
/// The description, the caller's location and the call stack are staged for the fault handler, then `SIGABRT` is
/// raised. The test is reported as `RESULT_CAUGHT_SIGNAL` with signal `SIGABRT` in the current stage.
#[track_caller]
#[inline(never)]
pub fn fail_assertion(description: &str) -> ! {
    let location = Location::caller();
    let stack = diagnostics::call_stack_after("forkcase::fault::fail_assertion", &[]);
    state::stage_premade_message(format!("assertion failed at {location}: {description}\n{stack}"));

    // SAFETY: see `handle_signal`.
    unsafe {
        libc::raise(libc::SIGABRT);
    }
    // Only reached when no handler is installed and SIGABRT is ignored.
    std::process::abort()
}

/// Conventional name of a signal number.
pub fn signal_name(signal: c_int) -> &'static str {
    match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGTERM => "SIGTERM",
        libc::SIGBUS => "SIGBUS",
        _ => "unknown signal",
    }
}

/// Assert a condition inside a test, failing through [`fail_assertion`] when it does not hold.
///
/// ```no_run
/// # use forkcase::require;
/// let rank = 2;
/// require!(rank == 2);
/// require!(rank > 0, "rank must be positive, got {rank}");
/// ```
#[macro_export]
macro_rules! require {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::fault::fail_assertion(concat!("require!(", stringify!($cond), ")"))
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fault::fail_assertion(&format!($($arg)+))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handled_signals_exclude_uncatchable() {
        assert!(!HANDLED_SIGNALS.contains(&libc::SIGKILL));
        assert!(!HANDLED_SIGNALS.contains(&libc::SIGSTOP));
        assert!(HANDLED_SIGNALS.contains(&libc::SIGSEGV));
        assert!(HANDLED_SIGNALS.contains(&libc::SIGABRT));
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(libc::SIGFPE), "SIGFPE");
        assert_eq!(signal_name(0), "unknown signal");
    }
}
