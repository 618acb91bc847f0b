//! Unified error type for hlsgrab.
//!
//! Every failure a capture can end with funnels into [`Error`], which carries
//! enough context for the binary to print a human-readable message and pick a
//! distinct process exit code via [`Error::exit_code`].

use std::time::Duration;

/// Exit code for a graceful stop or natural completion.
pub const EXIT_OK: i32 = 0;
/// Exit code for unexpected internal or I/O failures.
pub const EXIT_INTERNAL: i32 = 1;
/// Exit code for configuration errors. Matches clap's usage-error code.
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit code when the capture engine binary cannot be found.
pub const EXIT_ENGINE_NOT_FOUND: i32 = 3;
/// Exit code when the capture engine exits abnormally on its own.
pub const EXIT_ENGINE_CRASHED: i32 = 4;
/// Exit code when the engine ignores the stop signal and has to be killed.
pub const EXIT_ENGINE_UNRESPONSIVE: i32 = 5;

/// Unified error type covering all failure modes of a capture.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid user input: bad path, duration syntax, segment pattern, or
    /// settings file. Always raised before the engine is launched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The capture engine binary could not be resolved.
    #[error("Engine not found [{program}]: {detail}")]
    EngineNotFound {
        /// Program name or override path that was looked up.
        program: String,
        /// Human-readable description of the lookup failure.
        detail: String,
    },

    /// The engine exited abnormally without being asked to stop.
    #[error("Engine crashed ({status}){}", format_tail(.tail))]
    EngineCrashed {
        /// Description of the exit status.
        status: String,
        /// The last status lines the engine printed before exiting.
        tail: Vec<String>,
    },

    /// The engine did not exit within the grace period after a stop signal
    /// and was forcibly terminated.
    #[error("Engine unresponsive: no exit within {waited:?} of the stop signal; terminated")]
    EngineUnresponsive {
        /// How long the controller waited before forcing termination.
        waited: Duration,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("; last engine output:\n  {}", tail.join("\n  "))
    }
}

impl Error {
    /// Map this error to the process exit code documented in `--help`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) => EXIT_CONFIGURATION,
            Error::EngineNotFound { .. } => EXIT_ENGINE_NOT_FOUND,
            Error::EngineCrashed { .. } => EXIT_ENGINE_CRASHED,
            Error::EngineUnresponsive { .. } => EXIT_ENGINE_UNRESPONSIVE,
            Error::Io { .. } => EXIT_INTERNAL,
            Error::Internal(_) => EXIT_INTERNAL,
        }
    }

    /// Convenience constructor for [`Error::Configuration`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Convenience constructor for [`Error::EngineNotFound`].
    pub fn engine_not_found(program: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::EngineNotFound {
            program: program.into(),
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`Error::EngineCrashed`].
    pub fn engine_crashed(status: impl Into<String>, tail: Vec<String>) -> Self {
        Error::EngineCrashed {
            status: status.into(),
            tail,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display() {
        let err = Error::config("segment duration must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: segment duration must be positive"
        );
        assert_eq!(err.exit_code(), EXIT_CONFIGURATION);
    }

    #[test]
    fn engine_not_found_display() {
        let err = Error::engine_not_found("ffmpeg", "not found in PATH");
        assert_eq!(err.to_string(), "Engine not found [ffmpeg]: not found in PATH");
        assert_eq!(err.exit_code(), EXIT_ENGINE_NOT_FOUND);
    }

    #[test]
    fn engine_crashed_includes_tail() {
        let err = Error::engine_crashed(
            "exit code 1",
            vec!["Server returned 404 Not Found".into(), "Exiting".into()],
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Engine crashed (exit code 1)"));
        assert!(msg.contains("Server returned 404 Not Found"));
        assert_eq!(err.exit_code(), EXIT_ENGINE_CRASHED);
    }

    #[test]
    fn engine_crashed_without_tail() {
        let err = Error::engine_crashed("signal 11", Vec::new());
        assert_eq!(err.to_string(), "Engine crashed (signal 11)");
    }

    #[test]
    fn engine_unresponsive_display() {
        let err = Error::EngineUnresponsive {
            waited: Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));
        assert_eq!(err.exit_code(), EXIT_ENGINE_UNRESPONSIVE);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), EXIT_INTERNAL);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_OK,
            EXIT_INTERNAL,
            EXIT_CONFIGURATION,
            EXIT_ENGINE_NOT_FOUND,
            EXIT_ENGINE_CRASHED,
            EXIT_ENGINE_UNRESPONSIVE,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
