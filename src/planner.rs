//! Output naming.
//!
//! Turns the user's naming choices into the concrete [`OutputTarget`] handed
//! to the engine: a single file, or a segment template inside the output
//! directory.

use std::path::Path;

use chrono::{DateTime, TimeZone};
use hg_core::{CaptureConfig, Error, OutputTarget, Result, SegmentPattern};

/// Format of the timestamp inserted into generated file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Base name used when no filename is given.
pub const DEFAULT_BASENAME: &str = "stream";

/// Extension used when the filename has none.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Resolve the output target for `config` without touching the filesystem.
///
/// # Errors
///
/// [`Error::Configuration`] if the configuration itself is invalid.
pub fn plan_output<Tz>(config: &CaptureConfig, now: &DateTime<Tz>) -> Result<OutputTarget>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    config.validate()?;

    let stamp = now.format(TIMESTAMP_FORMAT).to_string();
    let file_name = resolve_filename(config.filename.as_deref(), config.add_timestamp, &stamp);

    let target = match config.segment {
        None => OutputTarget::File(config.output_dir.join(file_name)),
        Some(ref policy) => {
            let pattern = match policy.pattern() {
                Some(pattern) => pattern.clone(),
                None => SegmentPattern::derive(&file_name),
            };
            OutputTarget::Segments {
                dir: config.output_dir.clone(),
                pattern,
                duration: policy.duration(),
            }
        }
    };

    Ok(target)
}

/// Plan the output target and create its directory.
///
/// # Errors
///
/// [`Error::Configuration`] if planning fails or the output directory
/// cannot be created.
pub fn prepare_output<Tz>(config: &CaptureConfig, now: &DateTime<Tz>) -> Result<OutputTarget>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let target = plan_output(config, now)?;
    create_output_dir(target.directory())?;
    Ok(target)
}

fn create_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        Error::config(format!(
            "failed to create output directory {}: {e}",
            dir.display()
        ))
    })?;
    tracing::debug!("Output directory ready: {}", dir.display());
    Ok(())
}

/// Build the output file name.
///
/// Without a filename the result is always `stream_<stamp>.mp4`. With one,
/// the timestamp goes between stem and extension when requested, and a
/// missing extension becomes `.mp4`.
pub fn resolve_filename(filename: Option<&str>, add_timestamp: bool, stamp: &str) -> String {
    let Some(name) = filename else {
        return format!("{DEFAULT_BASENAME}_{stamp}.{DEFAULT_EXTENSION}");
    };

    let (stem, ext) = split_extension(name);
    let ext = ext.unwrap_or(DEFAULT_EXTENSION);
    if add_timestamp {
        format!("{stem}_{stamp}.{ext}")
    } else {
        format!("{stem}.{ext}")
    }
}

/// Split `name` at its last dot. Leading dots (hidden files) and a trailing
/// dot do not count as an extension separator.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        Some((stem, "")) if !stem.is_empty() => (stem, None),
        _ => (name, None),
    }
}
