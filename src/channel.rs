//! Raw descriptor the runner reports its status on.
//!
//! The status protocol rides on the runner's original standard output. Before any test runs, the runner moves that
//! pipe to a private descriptor and points fd 1 at standard error, so anything a test prints lands in the
//! diagnostic stream instead of corrupting the framing. Writes go straight to the descriptor with `write(2)`: the
//! fault handler uses the same path and must not touch the buffered, locked `std::io::Stdout`.

#![allow(unsafe_code)]

use std::io::{self, Write};

use crate::state;

/// Unbuffered writer over the status descriptor.
#[derive(Debug, Clone, Copy)]
pub struct StatusChannel {
    fd: libc::c_int,
}

impl StatusChannel {
    /// The channel recorded in process state (standard output until [`StatusChannel::isolate`] runs).
    pub fn current() -> Self {
        Self { fd: state::status_fd() }
    }

    /// Move the status stream off fd 1 and send fd 1 to standard error.
    ///
    /// ## Errors
    /// - The OS error from `dup`, `fcntl` or `dup2`.
    pub fn isolate() -> io::Result<Self> {
        // SAFETY: plain descriptor syscalls on fds this process owns; no memory is shared with the kernel.
        let fd = unsafe { libc::dup(libc::STDOUT_FILENO) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above, `fd` was just returned by `dup`.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
        // Flush anything already buffered for the old fd 1 before it is repointed.
        io::stdout().flush()?;
        // SAFETY: as above.
        if unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) } < 0 {
            return Err(io::Error::last_os_error());
        }
        state::set_status_fd(fd);
        tracing::debug!(fd, "status channel isolated from standard output");
        Ok(Self { fd })
    }
}

impl Write for StatusChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is a valid, initialized slice for its whole length.
        let written = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if written < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(written as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
