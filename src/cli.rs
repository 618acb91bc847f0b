use clap::Parser;
use hg_core::{parse_segment_duration, CaptureConfig, SegmentPattern, SegmentPolicy};
use std::path::PathBuf;
use std::time::Duration;

const EXIT_CODES: &str = "\
Exit codes:
  0  stopped by user, stream ended, or forced stop
  1  unexpected internal or I/O error
  2  configuration error
  3  ffmpeg not found
  4  ffmpeg crashed
  5  ffmpeg did not stop in time and was killed

Press Ctrl+C once to stop gracefully, twice quickly to force.";

#[derive(Parser, Debug)]
#[command(name = "hlsgrab")]
#[command(author, version, about = "Record HLS (m3u8) live streams with ffmpeg")]
#[command(after_help = EXIT_CODES)]
pub struct Cli {
    /// URL of the m3u8 stream
    pub url: String,

    /// Directory to save recordings in
    #[arg(short, long, default_value = hg_core::config::DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Output filename (default: stream_<timestamp>.mp4)
    #[arg(short, long)]
    pub filename: Option<String>,

    /// Path to the ffmpeg executable
    #[arg(short = 'p', long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Show raw ffmpeg output
    #[arg(short, long)]
    pub verbose: bool,

    /// Add date and time to the filename
    #[arg(short = 'd', long)]
    pub add_datetime: bool,

    /// Split the recording into segments of this length (seconds, M:SS or H:MM:SS)
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub segment: Option<Duration>,

    /// Segment filename pattern, e.g. part_%03d.mp4
    #[arg(short = 'F', long, value_name = "PATTERN", requires = "segment", value_parser = parse_pattern_arg)]
    pub segment_format: Option<SegmentPattern>,

    /// On stop, let the current segment finish first
    #[arg(short = 'c', long, requires = "segment")]
    pub complete_segment: bool,

    /// Path to a JSON supervisor settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for ffmpeg to exit after a stop before killing it
    #[arg(long, value_name = "SECS")]
    pub stop_timeout: Option<u64>,
}

impl Cli {
    /// Build the capture configuration these arguments describe.
    pub fn capture_config(&self) -> hg_core::Result<CaptureConfig> {
        let mut config = CaptureConfig::new(self.url.clone())
            .with_output_dir(self.output_dir.clone())
            .with_timestamp(self.add_datetime)
            .with_verbose(self.verbose);

        if let Some(ref name) = self.filename {
            config = config.with_filename(name.clone());
        }
        if let Some(ref path) = self.ffmpeg_path {
            config = config.with_engine_path(path.clone());
        }
        if let Some(duration) = self.segment {
            config = config.with_segment(SegmentPolicy::new(
                duration,
                self.segment_format.clone(),
                self.complete_segment,
            )?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_segment_duration(s).map_err(|e| e.to_string())
}

fn parse_pattern_arg(s: &str) -> Result<SegmentPattern, String> {
    SegmentPattern::parse(s).map_err(|e| e.to_string())
}
