//! Capture session lifecycle.
//!
//! A [`SessionController`] launches the engine, watches its status stream and
//! applies the stop policy to user interrupts:
//!
//! - one interrupt stops the engine gracefully, or, when the segment policy
//!   asks for complete segments, at the next segment boundary;
//! - a second interrupt while a boundary stop is pending stops right away;
//! - two interrupts within the double-interrupt window force-terminate;
//! - an engine that ignores the stop signal is killed after the stop timeout.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{SessionSummary, State, StopKind};
