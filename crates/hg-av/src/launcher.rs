//! Starting the capture engine.
//!
//! [`EngineLauncher`] is what the session controller calls to get a running
//! engine; [`FfmpegLauncher`] is the real implementation. Segment rotation is
//! delegated entirely to ffmpeg's segment muxer: the launcher only encodes
//! the duration and file pattern into the invocation.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::sync::mpsc;

use hg_core::{CaptureConfig, OutputTarget, SupervisorSettings};

use crate::command::EngineCommand;
use crate::process::{ChildProcess, EngineProcess};
use crate::progress::{spawn_reporter, ProgressEvent, ReporterSettings, ReporterTask};
use crate::status::StatusClassifier;
use crate::tools::EngineLocator;

/// A freshly started engine together with its status stream.
pub struct LaunchedEngine {
    /// The live process.
    pub process: Box<dyn EngineProcess>,
    /// Events published by the progress reporter.
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    /// Reader/reporter tasks, aborted when dropped.
    pub reporter: Option<ReporterTask>,
    /// The resolved engine executable.
    pub program: PathBuf,
}

impl std::fmt::Debug for LaunchedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchedEngine")
            .field("pid", &self.process.id())
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

/// Starts exactly one engine process per call.
pub trait EngineLauncher: Send + Sync {
    /// Resolve the engine binary and spawn it writing to `target`.
    ///
    /// # Errors
    ///
    /// [`hg_core::Error::EngineNotFound`] if the binary cannot be resolved
    /// (nothing is spawned), or a spawn failure.
    fn launch(
        &self,
        config: &CaptureConfig,
        target: &OutputTarget,
        settings: &SupervisorSettings,
    ) -> hg_core::Result<LaunchedEngine>;
}

/// Launches ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLauncher {
    search_path: Option<OsString>,
}

impl FfmpegLauncher {
    /// Launcher resolving the engine on the process `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher resolving the engine on the given search path instead.
    pub fn with_search_path(paths: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(paths.into()),
        }
    }
}

impl EngineLauncher for FfmpegLauncher {
    fn launch(
        &self,
        config: &CaptureConfig,
        target: &OutputTarget,
        settings: &SupervisorSettings,
    ) -> hg_core::Result<LaunchedEngine> {
        let program = EngineLocator::new(&settings.engine_program)
            .with_override(config.engine_path.clone())
            .with_search_path(self.search_path.clone())
            .resolve()?;

        let mut cmd = EngineCommand::new(program.clone());
        cmd.args(capture_args(&config.url, target));

        tracing::info!("Starting stream capture from: {}", config.url);
        match target {
            OutputTarget::File(path) => {
                tracing::info!("Output will be saved to: {}", path.display());
            }
            OutputTarget::Segments {
                pattern, duration, ..
            } => {
                tracing::info!("Segmenting output every {} seconds", duration.as_secs());
                tracing::info!("Segment format: {}", pattern);
            }
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (events, reporter) = spawn_reporter(
            stdout,
            stderr,
            StatusClassifier::new(target.pattern().cloned()),
            ReporterSettings {
                progress_interval: settings.progress_interval,
                verbose: config.verbose,
            },
        );

        Ok(LaunchedEngine {
            process: Box::new(ChildProcess::new(child, cmd.program_name())),
            events,
            reporter: Some(reporter),
            program,
        })
    }
}

/// Build the ffmpeg argument list for capturing `url` into `target`.
///
/// Progress goes to stdout as `key=value` blocks, log lines (including the
/// segment muxer's "Opening ... for writing") go to stderr.
pub fn capture_args(url: &str, target: &OutputTarget) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-nostdin",
        "-y",
        "-loglevel",
        "level+info",
        "-progress",
        "pipe:1",
        "-nostats",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(url.to_string());
    args.extend(["-c", "copy"].map(String::from));

    match target {
        OutputTarget::File(path) => {
            args.push(path.to_string_lossy().to_string());
        }
        OutputTarget::Segments {
            pattern, duration, ..
        } => {
            args.extend(["-f", "segment", "-segment_time"].map(String::from));
            args.push(duration.as_secs().to_string());
            args.extend(
                [
                    "-reset_timestamps",
                    "1",
                    "-segment_start_number",
                    "1",
                    "-segment_format",
                ]
                .map(String::from),
            );
            args.push(segment_muxer(pattern.extension()).to_string());
            args.push(target.engine_output().to_string_lossy().to_string());
        }
    }

    args
}

/// Muxer name for segment files with the given extension.
fn segment_muxer(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("mkv") => "matroska",
        Some("ts") => "mpegts",
        Some("mov") => "mov",
        Some("flv") => "flv",
        _ => "mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::SegmentPattern;
    use std::time::Duration;

    fn position(args: &[String], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("{flag} missing from {args:?}"))
    }

    #[test]
    fn single_file_args() {
        let target = OutputTarget::File(PathBuf::from("rec/game.mp4"));
        let args = capture_args("https://x/y.m3u8", &target);

        assert_eq!(args[position(&args, "-i") + 1], "https://x/y.m3u8");
        assert_eq!(args[position(&args, "-c") + 1], "copy");
        assert_eq!(args.last().unwrap(), "rec/game.mp4");
        assert!(!args.contains(&"segment".to_string()));
        assert!(args.contains(&"-nostdin".to_string()));
    }

    #[test]
    fn segment_args() {
        let target = OutputTarget::Segments {
            dir: PathBuf::from("rec"),
            pattern: SegmentPattern::parse("game_%03d.mp4").unwrap(),
            duration: Duration::from_secs(300),
        };
        let args = capture_args("https://x/y.m3u8", &target);

        assert_eq!(args[position(&args, "-f") + 1], "segment");
        assert_eq!(args[position(&args, "-segment_time") + 1], "300");
        assert_eq!(args[position(&args, "-reset_timestamps") + 1], "1");
        assert_eq!(args[position(&args, "-segment_start_number") + 1], "1");
        assert_eq!(args[position(&args, "-segment_format") + 1], "mp4");
        assert_eq!(
            PathBuf::from(args.last().unwrap()),
            PathBuf::from("rec").join("game_%03d.mp4")
        );
        // Input options precede the input, output options follow it.
        assert!(position(&args, "-i") < position(&args, "-f"));
    }

    #[test]
    fn segment_format_follows_pattern_extension() {
        let target = OutputTarget::Segments {
            dir: PathBuf::from("rec"),
            pattern: SegmentPattern::parse("part%d.mkv").unwrap(),
            duration: Duration::from_secs(60),
        };
        let args = capture_args("https://x/y.m3u8", &target);
        assert_eq!(args[position(&args, "-segment_format") + 1], "matroska");
    }

    #[test]
    fn launch_without_engine_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FfmpegLauncher::with_search_path(dir.path().as_os_str());
        let config = CaptureConfig::new("https://x/y.m3u8");
        let target = OutputTarget::File(dir.path().join("out.mp4"));

        let result = launcher.launch(&config, &target, &SupervisorSettings::default());
        assert!(matches!(
            result,
            Err(hg_core::Error::EngineNotFound { .. })
        ));
    }
}
