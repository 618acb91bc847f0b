//! Resolved output targets handed from the planner to the launcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pattern::SegmentPattern;

/// Where the engine writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A single output file.
    File(PathBuf),
    /// Fixed-duration segments named by `pattern` inside `dir`.
    Segments {
        /// Directory segment files are written to.
        dir: PathBuf,
        /// Segment file name pattern.
        pattern: SegmentPattern,
        /// Requested segment length.
        duration: Duration,
    },
}

impl OutputTarget {
    /// The path handed to the engine: the file itself, or the segment
    /// template joined onto the directory.
    pub fn engine_output(&self) -> PathBuf {
        match self {
            OutputTarget::File(path) => path.clone(),
            OutputTarget::Segments { dir, pattern, .. } => dir.join(pattern.as_str()),
        }
    }

    /// Directory output lands in.
    pub fn directory(&self) -> &Path {
        match self {
            OutputTarget::File(path) => path.parent().unwrap_or_else(|| Path::new(".")),
            OutputTarget::Segments { dir, .. } => dir,
        }
    }

    pub fn is_segmented(&self) -> bool {
        matches!(self, OutputTarget::Segments { .. })
    }

    /// Segment pattern, when segmenting.
    pub fn pattern(&self) -> Option<&SegmentPattern> {
        match self {
            OutputTarget::File(_) => None,
            OutputTarget::Segments { pattern, .. } => Some(pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_target() {
        let target = OutputTarget::File(PathBuf::from("recordings/game.mp4"));
        assert_eq!(target.engine_output(), PathBuf::from("recordings/game.mp4"));
        assert_eq!(target.directory(), Path::new("recordings"));
        assert!(!target.is_segmented());
        assert!(target.pattern().is_none());
    }

    #[test]
    fn segment_target() {
        let target = OutputTarget::Segments {
            dir: PathBuf::from("recordings"),
            pattern: SegmentPattern::derive("game.mp4"),
            duration: Duration::from_secs(300),
        };
        assert_eq!(
            target.engine_output(),
            PathBuf::from("recordings").join("game_%03d.mp4")
        );
        assert_eq!(target.directory(), Path::new("recordings"));
        assert!(target.is_segmented());
    }
}
