//! Call-stack text for crash and assertion reports.
//!
//! Formatting itself is delegated to [`std::backtrace::Backtrace`]; this module only cuts the captured stack at a
//! known frame so that a report starts at the code that failed, not at the machinery that noticed.

use std::backtrace::Backtrace;

/// Frames from the backtrace machinery itself, dropped when no boundary frame is found.
const CAPTURE_FRAMES: &[&str] = &["std::backtrace", "backtrace::", "forkcase::diagnostics::call_stack_after"];

/// Capture the current call stack, starting below the frame `boundary`.
///
/// Every frame up to and including the first one whose symbol contains `boundary` is dropped, then any leading
/// frames whose symbol is one of `skip`. When `boundary` is not on the stack (inlined, or symbols are
/// missing) only the capture frames are dropped.
///
/// The function whose name is passed as `boundary` must not be inlined.
pub fn call_stack_after(boundary: &str, skip: &[&str]) -> String {
    trim_frames(&Backtrace::force_capture().to_string(), boundary, skip)
}

fn trim_frames(rendered: &str, boundary: &str, skip: &[&str]) -> String {
    let frames = split_frames(rendered);
    let start = match frames.iter().position(|frame| frame_symbol(frame).contains(boundary)) {
        Some(index) => index + 1,
        None => frames
            .iter()
            .position(|frame| !CAPTURE_FRAMES.iter().any(|marker| frame_symbol(frame).contains(marker)))
            .unwrap_or(frames.len()),
    };
    let first_kept = frames[start..]
        .iter()
        .position(|frame| !skip.iter().any(|name| is_symbol(frame_symbol(frame), name)))
        .map_or(frames.len(), |offset| start + offset);

    let mut out = String::new();
    for frame in &frames[first_kept..] {
        for line in frame {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Group rendered backtrace lines into frames; a frame starts at a `N: symbol` line.
fn split_frames(rendered: &str) -> Vec<Vec<&str>> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in rendered.lines() {
        if is_frame_header(line) || frames.is_empty() {
            frames.push(vec![line]);
        } else if let Some(frame) = frames.last_mut() {
            frame.push(line);
        }
    }
    frames
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.split_once(':') {
        Some((index, _)) => !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Symbol of a frame: the header line without its index.
fn frame_symbol<'a>(frame: &[&'a str]) -> &'a str {
    let header = frame.first().copied().unwrap_or_default();
    match header.trim_start().split_once(": ") {
        Some((_, symbol)) => symbol.trim(),
        None => header.trim(),
    }
}

/// Whether `symbol` names `name`, allowing a compiler clone (`.constprop.0`) or version (`@GLIBC_2.2.5`) suffix.
fn is_symbol(symbol: &str, name: &str) -> bool {
    match symbol.strip_prefix(name) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "   0: core::option::Option<T>::unwrap_or_else
             at /rustc/library/core/src/option.rs:1015:21
   1: forkcase::fault::handle_signal
             at ./src/fault.rs:90:5
   2: <unknown>
   3: gsignal
   4: <app::Matrix as forkcase::registry::case::Fixture>::shutdown
             at ./src/matrix.rs:10:5
   5: <unknown>
";

    const TRAMPOLINE: &[&str] = &["<unknown>", "gsignal"];

    #[test]
    fn test_frame_headers() {
        assert!(is_frame_header("   0: std::backtrace::Backtrace::force_capture"));
        assert!(is_frame_header("  12: main"));
        assert!(!is_frame_header("             at ./src/fault.rs:90:5"));
        assert!(!is_frame_header("<unknown>"));
    }

    #[test]
    fn test_frame_symbol() {
        assert_eq!(frame_symbol(&["   3: gsignal"]), "gsignal");
        assert_eq!(frame_symbol(&["  12: app::main", "      at ./src/main.rs:1:1"]), "app::main");
    }

    #[test]
    fn test_symbol_suffixes() {
        assert!(is_symbol("raise", "raise"));
        assert!(is_symbol("__pthread_kill_implementation.constprop.0", "__pthread_kill_implementation"));
        assert!(is_symbol("pthread_kill@@GLIBC_2.34", "pthread_kill"));
        assert!(!is_symbol("raise_error", "raise"));
        assert!(!is_symbol("app::raise", "raise"));
    }

    #[test]
    fn test_cut_below_boundary_and_trampoline() {
        let trimmed = trim_frames(RENDERED, "forkcase::fault::handle_signal", TRAMPOLINE);
        assert!(trimmed.starts_with("   4: <app::Matrix as forkcase::registry::case::Fixture>::shutdown\n"));
        assert!(trimmed.contains("./src/matrix.rs:10:5"));
        // Only leading trampoline frames go.
        assert!(trimmed.ends_with("   5: <unknown>\n"));
    }

    #[test]
    fn test_missing_boundary_keeps_everything_but_capture_frames() {
        let trimmed = trim_frames(RENDERED, "forkcase::fault::fail_assertion", &[]);
        assert!(trimmed.starts_with("   0: core::option::Option<T>::unwrap_or_else\n"));

        let captured = "   0: std::backtrace::Backtrace::force_capture\n   1: app::main\n";
        assert_eq!(trim_frames(captured, "nowhere", &[]), "   1: app::main\n");
    }

    #[inline(never)]
    fn capture_here() -> String {
        call_stack_after("diagnostics::tests::capture_here", &[])
    }

    #[test]
    fn test_live_capture_starts_at_caller() {
        let stack = capture_here();
        let first = stack.lines().next().unwrap_or_default();
        assert!(first.contains("test_live_capture_starts_at_caller"), "stack:\n{stack}");
        assert!(!stack.contains("capture_here"));
        assert!(!stack.contains("force_capture"));
    }
}
