//! Capture configuration types.
//!
//! [`CaptureConfig`] is built once from validated command-line input and is
//! never mutated afterwards. [`SupervisorSettings`] holds the controller's
//! tunables and is deserialized from an optional JSON file; every field
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::pattern::SegmentPattern;
use crate::Error;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Default directory recordings are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "recordings";

/// Everything a capture session needs to know about what to record and where.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Source stream URL (normally an HLS `.m3u8` manifest).
    pub url: String,
    /// Directory output files are written to; created if missing.
    pub output_dir: PathBuf,
    /// Explicit output file name. `None` means `stream_<timestamp>.mp4`.
    pub filename: Option<String>,
    /// Append a timestamp even when an explicit file name is given.
    pub add_timestamp: bool,
    /// Explicit path to the engine binary, overriding the `PATH` lookup.
    pub engine_path: Option<PathBuf>,
    /// Stream raw engine status lines to the log.
    pub verbose: bool,
    /// Segmentation policy, present iff segmentation was requested.
    pub segment: Option<SegmentPolicy>,
}

impl CaptureConfig {
    /// Create a configuration for `url` with all other settings at their
    /// defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            filename: None,
            add_timestamp: false,
            engine_path: None,
            verbose: false,
            segment: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn with_timestamp(mut self, add: bool) -> Self {
        self.add_timestamp = add;
        self
    }

    pub fn with_engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_path = Some(path.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_segment(mut self, policy: SegmentPolicy) -> Self {
        self.segment = Some(policy);
        self
    }

    /// Reject configurations that can never produce a capture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty URL, an empty output
    /// directory, or a file name that contains directory separators.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("stream URL is empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::config("output directory is empty"));
        }
        if let Some(ref name) = self.filename {
            if name.is_empty() {
                return Err(Error::config("output filename is empty"));
            }
            if name.chars().any(std::path::is_separator) {
                return Err(Error::config(format!(
                    "output filename '{name}' must not contain directory separators; use --output-dir"
                )));
            }
        }
        Ok(())
    }

    /// Return a list of non-fatal issues worth telling the user about.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.url.contains("m3u8") {
            warnings.push(format!(
                "URL '{}' doesn't appear to be an m3u8 stream; make sure it is a valid HLS stream URL",
                self.url
            ));
        }

        if let Some(ref path) = self.engine_path {
            if !path.exists() {
                warnings.push(format!(
                    "engine path {} does not exist; falling back to PATH lookup",
                    path.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// SegmentPolicy
// ---------------------------------------------------------------------------

/// How output is split into fixed-duration segments. Rotation itself is
/// performed by the engine; this only describes what to ask it for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPolicy {
    duration: Duration,
    pattern: Option<SegmentPattern>,
    complete_current_segment: bool,
}

impl SegmentPolicy {
    /// Build a policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `duration` is shorter than one
    /// second.
    pub fn new(
        duration: Duration,
        pattern: Option<SegmentPattern>,
        complete_current_segment: bool,
    ) -> Result<Self> {
        if duration.as_secs() == 0 {
            return Err(Error::config("segment duration must be at least one second"));
        }
        Ok(Self {
            duration,
            pattern,
            complete_current_segment,
        })
    }

    /// Segment length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Explicit segment file name pattern, if one was given.
    pub fn pattern(&self) -> Option<&SegmentPattern> {
        self.pattern.as_ref()
    }

    /// Whether a stop request waits for the current segment to finish.
    pub fn complete_current_segment(&self) -> bool {
        self.complete_current_segment
    }
}

// ---------------------------------------------------------------------------
// SupervisorSettings
// ---------------------------------------------------------------------------

/// Tunables for the session controller and progress reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Program name looked up on `PATH` when no override is given.
    pub engine_program: String,
    /// How long to wait for the engine to exit after a stop signal before
    /// forcing termination.
    #[serde(rename = "stop_timeout_secs", with = "duration_secs")]
    pub stop_timeout: Duration,
    /// Two interrupts closer together than this force-terminate the engine.
    #[serde(rename = "double_interrupt_window_ms", with = "duration_millis")]
    pub double_interrupt_window: Duration,
    /// A launched engine that has printed nothing is considered running
    /// after this long.
    #[serde(rename = "startup_grace_secs", with = "duration_secs")]
    pub startup_grace: Duration,
    /// Interval between non-verbose progress lines.
    #[serde(rename = "progress_interval_secs", with = "duration_secs")]
    pub progress_interval: Duration,
    /// Number of trailing engine lines kept as crash diagnostics.
    pub status_tail_lines: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            engine_program: "ffmpeg".to_string(),
            stop_timeout: Duration::from_secs(10),
            double_interrupt_window: Duration::from_millis(500),
            startup_grace: Duration::from_secs(2),
            progress_interval: Duration::from_secs(5),
            status_tail_lines: 20,
        }
    }
}

impl SupervisorSettings {
    /// Deserialize settings from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json_str)
            .map_err(|e| Error::config(format!("settings parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`.
    ///
    /// `None` or a path that does not exist yields the defaults; a file that
    /// exists but cannot be read or parsed is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).map_err(|e| match e {
                Error::Configuration(msg) => {
                    Error::config(format!("{}: {msg}", path.display()))
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::config(format!(
                "failed to read settings file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.engine_program.trim().is_empty() {
            return Err(Error::config("engine_program is empty"));
        }
        if self.stop_timeout.is_zero() {
            return Err(Error::config("stop_timeout_secs must be positive"));
        }
        if self.progress_interval.is_zero() {
            return Err(Error::config("progress_interval_secs must be positive"));
        }
        Ok(())
    }
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde helpers to (de)serialize `Duration` as whole milliseconds.
mod duration_millis {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn capture_config_defaults() {
        let cfg = CaptureConfig::new("https://example.com/live.m3u8");
        assert_eq!(cfg.output_dir, PathBuf::from("recordings"));
        assert!(cfg.filename.is_none());
        assert!(!cfg.add_timestamp);
        assert!(cfg.segment.is_none());
        assert!(cfg.validate().is_ok());
        assert!(cfg.warnings().is_empty());
    }

    #[test]
    fn capture_config_rejects_empty_url() {
        assert_matches!(
            CaptureConfig::new("  ").validate(),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn capture_config_rejects_path_in_filename() {
        let cfg = CaptureConfig::new("https://x/y.m3u8").with_filename("a/b.mp4");
        assert_matches!(cfg.validate(), Err(Error::Configuration(_)));
    }

    #[test]
    fn non_hls_url_warns() {
        let cfg = CaptureConfig::new("https://example.com/video.mp4");
        let warnings = cfg.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("m3u8"));
    }

    #[test]
    fn segment_policy_rejects_sub_second() {
        assert!(SegmentPolicy::new(Duration::from_millis(500), None, false).is_err());
        let policy = SegmentPolicy::new(Duration::from_secs(300), None, true).unwrap();
        assert_eq!(policy.duration(), Duration::from_secs(300));
        assert!(policy.complete_current_segment());
        assert!(policy.pattern().is_none());
    }

    #[test]
    fn settings_empty_json_is_default() {
        let settings = SupervisorSettings::from_json("{}").unwrap();
        assert_eq!(settings, SupervisorSettings::default());
    }

    #[test]
    fn settings_partial_json() {
        let settings = SupervisorSettings::from_json(
            r#"{"stop_timeout_secs": 3, "double_interrupt_window_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(settings.stop_timeout, Duration::from_secs(3));
        assert_eq!(settings.double_interrupt_window, Duration::from_millis(250));
        assert_eq!(settings.engine_program, "ffmpeg");
    }

    #[test]
    fn settings_reject_zero_stop_timeout() {
        assert_matches!(
            SupervisorSettings::from_json(r#"{"stop_timeout_secs": 0}"#),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn settings_roundtrip_uses_unit_suffixed_keys() {
        let json = serde_json::to_string(&SupervisorSettings::default()).unwrap();
        assert!(json.contains("\"stop_timeout_secs\":10"));
        assert!(json.contains("\"double_interrupt_window_ms\":500"));
    }

    #[test]
    fn settings_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SupervisorSettings::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(settings, SupervisorSettings::default());
    }

    #[test]
    fn settings_load_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = SupervisorSettings::load(Some(file.path())).unwrap_err();
        assert_matches!(err, Error::Configuration(ref msg) if msg.contains("settings parse error"));
    }
}
