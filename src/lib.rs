//! hlsgrab - record HLS live streams with ffmpeg
//!
//! This library crate exposes the session machinery for the binary and for
//! integration testing.

pub mod interrupt;
pub mod planner;
pub mod session;
