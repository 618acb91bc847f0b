//! hg-core: shared types for the hlsgrab capture tool.
//!
//! This crate is the foundational dependency for the other hg-* crates and
//! the `hlsgrab` binary, providing the unified error type (with its
//! process exit-code mapping), the immutable capture configuration, the
//! supervisor tunables, segment duration parsing, segment filename
//! patterns and the resolved output target.

pub mod config;
pub mod duration;
pub mod error;
pub mod pattern;
pub mod target;

// Re-export the most commonly used items at the crate root.
pub use config::{CaptureConfig, SegmentPolicy, SupervisorSettings};
pub use duration::{format_hms, parse_segment_duration};
pub use error::{Error, Result};
pub use pattern::SegmentPattern;
pub use target::OutputTarget;
