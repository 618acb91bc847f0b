//! Builder for spawning a supervised engine process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

/// A builder for constructing a long-running engine invocation.
///
/// Unlike a run-to-completion command, the spawned child is handed back to
/// the caller: stdout and stderr are piped for status consumption, stdin is
/// closed, and the child is killed if its handle is dropped. On Unix the
/// child is placed in its own process group so a terminal Ctrl+C reaches
/// only the supervisor, which decides how to stop the engine.
///
/// # Example
///
/// ```no_run
/// use hg_av::EngineCommand;
/// use std::path::PathBuf;
///
/// # fn example() -> hg_core::Result<()> {
/// let mut cmd = EngineCommand::new(PathBuf::from("ffmpeg"));
/// cmd.args(["-i", "https://example.com/live.m3u8", "-c", "copy", "out.mp4"]);
/// let child = cmd.spawn()?;
/// # drop(child);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl EngineCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short name of the program for log and error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Spawn the process.
    ///
    /// # Errors
    ///
    /// Returns [`hg_core::Error::EngineNotFound`] if the program vanished
    /// between resolution and spawn, and [`hg_core::Error::Internal`] for any
    /// other spawn failure.
    pub fn spawn(&self) -> hg_core::Result<Child> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!("spawn: {} {}", self.program.display(), self.args.join(" "));

        cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                hg_core::Error::engine_not_found(program_name, format!("failed to spawn: {e}"))
            }
            _ => hg_core::Error::Internal(format!("failed to spawn {program_name}: {e}")),
        })
    }
}
