use std::fmt;
use std::time::Duration;

use hg_av::ProgressSnapshot;
use hg_core::OutputTarget;

/// Lifecycle of one capture session.
///
/// Transitions only ever move forward in this order; `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    Idle,
    Starting,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Completed)
                | (Stopping, Failed)
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Idle => "idle",
            State::Starting => "starting",
            State::Running => "running",
            State::Stopping => "stopping",
            State::Completed => "completed",
            State::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a successful session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// The engine finished on its own (the stream ended).
    Natural,
    /// Stopped gracefully on an interrupt.
    Graceful,
    /// Stopped gracefully once the current segment was complete.
    AfterSegment,
    /// Force-terminated on a double interrupt; the last file may be
    /// truncated.
    Forced,
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopKind::Natural => "stream ended",
            StopKind::Graceful => "stopped by user",
            StopKind::AfterSegment => "stopped by user after segment completed",
            StopKind::Forced => "force-terminated by user",
        };
        f.write_str(s)
    }
}

/// Outcome of a successful [`run`](super::SessionController::run).
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub stop: StopKind,
    /// Wall-clock time from launch to engine exit.
    pub recorded: Duration,
    /// Last progress the reporter published.
    pub snapshot: ProgressSnapshot,
    pub target: OutputTarget,
}
