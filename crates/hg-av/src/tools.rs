//! Capture engine discovery.
//!
//! The [`EngineLocator`] resolves the engine binary once, before anything is
//! spawned: an explicit override path wins when it points at an executable
//! file, otherwise the program name is looked up on `PATH` with
//! [`which`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hg_core::{Error, Result};

/// Resolves the path of the capture engine executable.
#[derive(Debug, Clone)]
pub struct EngineLocator {
    program: String,
    override_path: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl EngineLocator {
    /// Locate `program` (e.g. "ffmpeg") on the process `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            override_path: None,
            search_path: None,
        }
    }

    /// Prefer an explicit executable path over the `PATH` lookup.
    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        self.override_path = path;
        self
    }

    /// Search these directories (in `PATH` syntax) instead of the process
    /// environment's `PATH`.
    pub fn with_search_path(mut self, paths: Option<OsString>) -> Self {
        self.search_path = paths;
        self
    }

    /// Program name looked up on `PATH`.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolve the engine executable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineNotFound`] when neither the override nor the
    /// search path yields an executable.
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.override_path {
            if is_executable(path) {
                tracing::debug!("Using engine override {}", path.display());
                return Ok(path.clone());
            }
            tracing::warn!(
                "Engine override {} is not an executable file; falling back to PATH lookup for {}",
                path.display(),
                self.program
            );
        }

        let found = match self.search_path {
            Some(ref paths) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                which::which_in(&self.program, Some(paths), cwd)
            }
            None => which::which(&self.program),
        };

        found.map_err(|e| {
            let detail = match self.override_path {
                Some(ref path) => format!(
                    "override {} is not executable and PATH lookup failed: {e}",
                    path.display()
                ),
                None => format!("{e}; is it installed and in PATH?"),
            };
            Error::engine_not_found(&self.program, detail)
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn empty_search_path() -> (tempfile::TempDir, OsString) {
        let dir = tempfile::tempdir().unwrap();
        let paths = dir.path().as_os_str().to_os_string();
        (dir, paths)
    }

    #[test]
    fn missing_engine_is_not_found() {
        let (_dir, paths) = empty_search_path();
        let result = EngineLocator::new("ffmpeg")
            .with_search_path(Some(paths))
            .resolve();
        assert_matches!(result, Err(Error::EngineNotFound { ref program, .. }) if program == "ffmpeg");
    }

    #[test]
    fn missing_override_mentions_override() {
        let (_dir, paths) = empty_search_path();
        let err = EngineLocator::new("ffmpeg")
            .with_override(Some(PathBuf::from("/nonexistent/ffmpeg")))
            .with_search_path(Some(paths))
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ffmpeg"));
    }

    #[cfg(unix)]
    #[test]
    fn executable_override_wins() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("my-ffmpeg");
        std::fs::write(&engine, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = EngineLocator::new("ffmpeg")
            .with_override(Some(engine.clone()))
            .resolve()
            .unwrap();
        assert_eq!(resolved, engine);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_override_falls_back_to_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("not-executable");
        std::fs::write(&plain, "data").unwrap();

        let bin = tempfile::tempdir().unwrap();
        let engine = bin.path().join("ffmpeg");
        std::fs::write(&engine, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = EngineLocator::new("ffmpeg")
            .with_override(Some(plain))
            .with_search_path(Some(bin.path().as_os_str().to_os_string()))
            .resolve()
            .unwrap();
        assert_eq!(resolved, engine);
    }
}
