//! The running engine as seen by the session controller.
//!
//! [`EngineProcess`] is the seam between the controller's cancellation
//! policy and the operating system: the real implementation wraps a tokio
//! [`Child`], tests substitute a scripted double.

use std::fmt;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::Child;

/// POSIX signal numbers the engine may die from when asked to stop.
const SIGINT: i32 = 2;
const SIGTERM: i32 = 15;

/// ffmpeg exits with 255 after finishing up on SIGINT/SIGTERM.
const ENGINE_SIGNALLED_EXIT: i32 = 255;

/// How the engine process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one.
    pub signal: Option<i32>,
}

impl EngineExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether this is what a stopped engine looks like: a clean exit, the
    /// engine's "exiting after signal" code, or death by SIGINT/SIGTERM.
    pub fn is_stop_status(&self) -> bool {
        match (self.code, self.signal) {
            (Some(0), _) | (Some(ENGINE_SIGNALLED_EXIT), _) => true,
            (_, Some(SIGINT)) | (_, Some(SIGTERM)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EngineExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "killed by signal {sig}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

impl From<ExitStatus> for EngineExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// A live engine process owned by the session controller.
#[async_trait]
pub trait EngineProcess: Send {
    /// OS process id, while the process has not been reaped.
    fn id(&self) -> Option<u32>;

    /// Ask the engine to finalize its output and exit.
    fn signal_stop(&mut self) -> hg_core::Result<()>;

    /// Terminate the engine immediately.
    fn force_kill(&mut self) -> hg_core::Result<()>;

    /// Wait for the process to exit. Must be cancel-safe: dropping the
    /// future and calling `wait` again loses nothing.
    async fn wait(&mut self) -> hg_core::Result<EngineExit>;
}

/// [`EngineProcess`] backed by a real child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    name: String,
    /// Set when a stop request had to be carried out as a kill.
    stop_killed: bool,
}

impl ChildProcess {
    pub fn new(child: Child, name: impl Into<String>) -> Self {
        Self {
            child,
            name: name.into(),
            stop_killed: false,
        }
    }
}

#[async_trait]
impl EngineProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn signal_stop(&mut self) -> hg_core::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        tracing::debug!("Sending SIGTERM to {} (pid {pid})", self.name);
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(hg_core::Error::Internal(format!(
                "failed to signal {}: {e}",
                self.name
            ))),
        }
    }

    #[cfg(not(unix))]
    fn signal_stop(&mut self) -> hg_core::Result<()> {
        // No graceful signal is available; stopping is a kill.
        self.stop_killed = true;
        self.force_kill()
    }

    fn force_kill(&mut self) -> hg_core::Result<()> {
        tracing::debug!("Killing {}", self.name);
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(hg_core::Error::Internal(format!(
                "failed to kill {}: {e}",
                self.name
            ))),
        }
    }

    async fn wait(&mut self) -> hg_core::Result<EngineExit> {
        let status = self.child.wait().await?;
        Ok(settle_exit(EngineExit::from(status), self.stop_killed))
    }
}

/// A kill that stood in for a stop request counts as a stop, reported as
/// death by SIGTERM.
fn settle_exit(exit: EngineExit, stop_killed: bool) -> EngineExit {
    if stop_killed && !exit.is_stop_status() {
        EngineExit::signal(SIGTERM)
    } else {
        exit
    }
}
