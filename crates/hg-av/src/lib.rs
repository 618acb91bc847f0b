//! # hg-av
//!
//! Capture engine management for hlsgrab.
//!
//! This crate provides:
//!
//! - **Engine discovery** ([`EngineLocator`]) -- resolve the ffmpeg binary
//!   from an explicit override or `PATH`.
//! - **Process spawning** ([`EngineCommand`]) -- piped stdout/stderr, closed
//!   stdin, own process group, kill on drop.
//! - **Process control** ([`EngineProcess`], [`ChildProcess`]) -- graceful
//!   stop, forced kill and cancel-safe waiting behind a trait.
//! - **Launching** ([`EngineLauncher`], [`FfmpegLauncher`]) -- build the
//!   capture invocation (optionally segmenting) and start it.
//! - **Status parsing** ([`StatusClassifier`]) and **progress reporting**
//!   ([`ProgressReporter`], [`spawn_reporter`]).

pub mod command;
pub mod launcher;
pub mod process;
pub mod progress;
pub mod status;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::EngineCommand;
pub use launcher::{capture_args, EngineLauncher, FfmpegLauncher, LaunchedEngine};
pub use process::{ChildProcess, EngineExit, EngineProcess};
pub use progress::{
    progress_line, spawn_reporter, ProgressEvent, ProgressReporter, ProgressSnapshot,
    ReporterSettings, ReporterTask, StatusSource,
};
pub use status::{StatusClassifier, StatusLine};
pub use tools::EngineLocator;
