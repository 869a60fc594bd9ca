//! Child process creation for the spawner.
//!
//! [`ChildLauncher`] separates "run this one test somewhere and give me its report" from the spawner's walk and
//! bookkeeping, so the spawner can be driven with canned reports in tests. [`ProcessLauncher`] is the real thing:
//! it re-invokes the current executable in runner mode with a schedule selecting exactly one test.

use std::ffi::OsString;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use forkcase_core::{ResultKind, Stage};
use thiserror::Error;

use crate::protocol::{self, ProtocolError, StatusMessage};
use crate::registry::path::WHOLE_TREE;

/// Errors that abort the whole spawner run.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("cannot locate the test executable: {0}")]
    Executable(#[source] std::io::Error),

    #[error("failed to launch child for {path}: {source}")]
    Launch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("child for {path} has no status pipe")]
    MissingPipe { path: String },

    #[error("failed to wait for child of {path}: {source}")]
    Wait {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt status report from child of {path}: {source}")]
    Protocol {
        path: String,
        #[source]
        source: ProtocolError,
    },
}

/// Run one test in isolation and return its status report.
pub trait ChildLauncher {
    fn launch(&mut self, path: &str) -> Result<StatusMessage, SpawnError>;
}

/// Launches each test in a fresh child process of the current executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    executable: PathBuf,
    debug: bool,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(executable: PathBuf, debug: bool, timeout: Option<Duration>) -> Self {
        Self {
            executable,
            debug,
            timeout,
        }
    }

    /// Launcher for the executable of the running process.
    pub fn current_exe(debug: bool, timeout: Option<Duration>) -> Result<Self, SpawnError> {
        let executable = std::env::current_exe().map_err(SpawnError::Executable)?;
        Ok(Self::new(executable, debug, timeout))
    }

    /// Arguments selecting only `path`, in runner mode.
    pub fn child_args(&self, path: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--runner".into(), "-r".into(), WHOLE_TREE.into(), "-a".into(), path.into()];
        if self.debug {
            args.push("-d".into());
        }
        args
    }

    fn read_report(&self, stdout: ChildStdout) -> Option<Result<StatusMessage, ProtocolError>> {
        let Some(limit) = self.timeout else {
            return Some(protocol::read_status(&mut BufReader::new(stdout)));
        };
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // The receiver is gone once the deadline passed; the late report is dropped.
            let _ = tx.send(protocol::read_status(&mut BufReader::new(stdout)));
        });
        rx.recv_timeout(limit).ok()
    }
}

impl ChildLauncher for ProcessLauncher {
    fn launch(&mut self, path: &str) -> Result<StatusMessage, SpawnError> {
        tracing::debug!(path, executable = %self.executable.display(), "launching child");
        let mut child = Command::new(&self.executable)
            .args(self.child_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SpawnError::Launch {
                path: path.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| SpawnError::MissingPipe {
            path: path.to_string(),
        })?;

        let Some(report) = self.read_report(stdout) else {
            return timed_out(&mut child, path, self.timeout.unwrap_or_default());
        };
        let exit = child.wait().map_err(|source| SpawnError::Wait {
            path: path.to_string(),
            source,
        })?;
        tracing::debug!(path, %exit, "child exited");

        match report {
            Ok(status) => Ok(status),
            Err(ProtocolError::Empty) => Ok(silent_exit(exit)),
            Err(source) => Err(SpawnError::Protocol {
                path: path.to_string(),
                source,
            }),
        }
    }
}

fn timed_out(child: &mut Child, path: &str, limit: Duration) -> Result<StatusMessage, SpawnError> {
    tracing::warn!(path, ?limit, "child did not report in time; killing it");
    // The child may have exited on its own in the meantime.
    let _ = child.kill();
    child.wait().map_err(|source| SpawnError::Wait {
        path: path.to_string(),
        source,
    })?;
    Ok(StatusMessage::failure(
        ResultKind::UnspecifiedFailure,
        Stage::PreInitialize,
        0,
        format!("timed out after {:.1}s without reporting a status", limit.as_secs_f64()),
    ))
}

/// Report for a child that exited without writing anything.
fn silent_exit(exit: ExitStatus) -> StatusMessage {
    StatusMessage::failure(
        ResultKind::UnspecifiedFailure,
        Stage::PreInitialize,
        0,
        format!("child exited without reporting a status ({exit})"),
    )
}
