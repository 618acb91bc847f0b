use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use hg_av::{
    EngineExit, EngineLauncher, EngineProcess, LaunchedEngine, ProgressEvent, ProgressSnapshot,
    StatusSource,
};
use hg_core::{format_hms, CaptureConfig, Error, OutputTarget, Result, SupervisorSettings};

use super::state::{SessionSummary, State, StopKind};
use crate::interrupt::{Interrupt, Interrupts};
use crate::planner;

/// How long to keep reading status lines after the engine has exited, so
/// its last words make it into the crash tail.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Supervises one capture from launch to engine exit.
///
/// All decisions are taken on a single task: engine exit, reporter events,
/// interrupts and the two timers are multiplexed with `tokio::select!`, so
/// interrupts are handled strictly in arrival order.
pub struct SessionController<L> {
    config: Arc<CaptureConfig>,
    settings: SupervisorSettings,
    launcher: L,
    interrupts: Interrupts,
    history: Vec<State>,
}

impl<L: EngineLauncher> SessionController<L> {
    pub fn new(
        config: Arc<CaptureConfig>,
        settings: SupervisorSettings,
        launcher: L,
        interrupts: Interrupts,
    ) -> Self {
        Self {
            config,
            settings,
            launcher,
            interrupts,
            history: vec![State::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.history.last().copied().unwrap_or(State::Idle)
    }

    /// Every state the session has been in, oldest first.
    pub fn history(&self) -> &[State] {
        &self.history
    }

    /// Run the capture until the engine exits.
    ///
    /// # Errors
    ///
    /// Any [`Error`]; the session is then `Failed`. A stop the user asked for,
    /// including a forced one, is not an error.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        if self.state() != State::Idle {
            return Err(Error::Internal(format!(
                "session cannot be run again (already {})",
                self.state()
            )));
        }
        self.transition(State::Starting);

        match self.start_and_supervise().await {
            Ok(summary) => {
                log_summary(&summary);
                Ok(summary)
            }
            Err(e) => {
                self.transition(State::Failed);
                Err(e)
            }
        }
    }

    async fn start_and_supervise(&mut self) -> Result<SessionSummary> {
        let target = planner::prepare_output(&self.config, &Local::now())?;

        let LaunchedEngine {
            process,
            events,
            reporter,
            program,
        } = self.launcher.launch(&self.config, &target, &self.settings)?;
        tracing::debug!("Launched {} (pid {:?})", program.display(), process.id());

        let mut session = CaptureSession::new(process, self.settings.status_tail_lines);
        let outcome = self.supervise(&mut session, events).await;
        drop(reporter);

        let stop = outcome?;
        Ok(SessionSummary {
            stop,
            recorded: session.recorded(),
            snapshot: session.snapshot.clone(),
            target,
        })
    }

    async fn supervise(
        &mut self,
        session: &mut CaptureSession,
        mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    ) -> Result<StopKind> {
        let startup_deadline = session.started + self.settings.startup_grace;
        let mut events_open = true;
        let mut interrupts_open = true;

        loop {
            let starting = self.state() == State::Starting;
            let stop_deadline = session.stop_deadline.filter(|_| !session.killed);

            tokio::select! {
                exit = session.process.wait() => {
                    let exit = exit?;
                    session.reaped = true;
                    session.finished = Some(Instant::now());
                    self.promote();
                    if events_open {
                        drain(session, &mut events).await;
                    }
                    return self.finish(session, exit);
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.promote();
                        self.on_event(session, event)?;
                    }
                    None => events_open = false,
                },
                interrupt = self.interrupts.recv(), if interrupts_open => match interrupt {
                    Some(interrupt) => {
                        self.promote();
                        self.on_interrupt(session, interrupt)?;
                    }
                    None => interrupts_open = false,
                },
                _ = sleep_until(startup_deadline), if starting => {
                    tracing::debug!("No engine output within {:?}; assuming it is running", self.settings.startup_grace);
                    self.promote();
                }
                _ = sleep_until(stop_deadline.unwrap_or(startup_deadline)), if stop_deadline.is_some() => {
                    tracing::error!(
                        "Engine did not exit within {} seconds of the stop signal; terminating",
                        self.settings.stop_timeout.as_secs()
                    );
                    session.unresponsive = true;
                    session.kill_once()?;
                }
            }
        }
    }

    fn on_event(&mut self, session: &mut CaptureSession, event: ProgressEvent) -> Result<()> {
        match event {
            ProgressEvent::Snapshot(snapshot) => session.absorb(snapshot),
            ProgressEvent::SegmentStarted { index, .. } => {
                if session.pending_stop && !session.stop_sent && !session.killed {
                    tracing::info!("Segment {} started; stopping as requested", index);
                    self.graceful_stop(session, StopKind::AfterSegment)?;
                }
            }
            ProgressEvent::StreamClosed => tracing::debug!("Engine output streams closed"),
        }
        Ok(())
    }

    fn on_interrupt(&mut self, session: &mut CaptureSession, interrupt: Interrupt) -> Result<()> {
        let now = Instant::now();
        let double = session
            .last_interrupt
            .is_some_and(|prev| now.saturating_duration_since(prev) <= self.settings.double_interrupt_window);
        session.last_interrupt = Some(now);

        if session.killed {
            tracing::debug!("Ignoring {}; engine already terminated", interrupt);
            return Ok(());
        }

        if double {
            tracing::warn!("Double interrupt; terminating engine immediately");
            session.forced_by_user = true;
            session.kill_once()?;
            self.transition(State::Stopping);
            return Ok(());
        }

        match self.state() {
            State::Running if session.pending_stop => {
                tracing::info!("Second interrupt; not waiting for the segment to complete");
                self.graceful_stop(session, StopKind::Graceful)
            }
            State::Running if self.completes_segment() => {
                session.pending_stop = true;
                tracing::info!(
                    "Will stop after the current segment completes (interrupt again to stop now, twice quickly to force)"
                );
                Ok(())
            }
            State::Running => {
                tracing::info!("Received {}; stopping stream capture", interrupt);
                self.graceful_stop(session, StopKind::Graceful)
            }
            State::Stopping => {
                tracing::info!("Already stopping; interrupt twice quickly to force termination");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn graceful_stop(&mut self, session: &mut CaptureSession, kind: StopKind) -> Result<()> {
        if session.stop_sent {
            return Ok(());
        }
        session.process.signal_stop()?;
        session.stop_sent = true;
        session.stop_kind = kind;
        session.stop_deadline = Some(Instant::now() + self.settings.stop_timeout);
        self.transition(State::Stopping);
        Ok(())
    }

    fn finish(&mut self, session: &mut CaptureSession, exit: EngineExit) -> Result<StopKind> {
        tracing::debug!("Engine exited: {}", exit);

        if session.unresponsive {
            return Err(Error::EngineUnresponsive {
                waited: self.settings.stop_timeout,
            });
        }

        if session.forced_by_user {
            tracing::warn!("Engine was force-terminated; the last output file may be incomplete");
            self.transition(State::Completed);
            return Ok(StopKind::Forced);
        }

        let expected = if session.stop_sent {
            exit.is_stop_status()
        } else {
            exit.success()
        };
        if !expected {
            let tail = session.tail();
            for line in &tail {
                tracing::debug!(target: hg_av::progress::ENGINE_LOG_TARGET, "{}", line);
            }
            return Err(Error::engine_crashed(exit.to_string(), tail));
        }

        let kind = if session.stop_sent {
            session.stop_kind
        } else {
            tracing::info!("Stream ended");
            StopKind::Natural
        };
        self.transition(State::Stopping);
        self.transition(State::Completed);
        Ok(kind)
    }

    fn completes_segment(&self) -> bool {
        self.config
            .segment
            .as_ref()
            .is_some_and(|policy| policy.complete_current_segment())
    }

    /// Starting -> Running; anything observed from the engine proves it is up.
    fn promote(&mut self) {
        if self.state() == State::Starting {
            self.transition(State::Running);
        }
    }

    fn transition(&mut self, next: State) {
        let current = self.state();
        if current == next {
            return;
        }
        debug_assert!(
            current.can_transition_to(next),
            "illegal session transition {current} -> {next}"
        );
        tracing::debug!("Session {} -> {}", current, next);
        self.history.push(next);
    }
}

/// Read whatever the reporter still has, bounded by [`DRAIN_TIMEOUT`].
async fn drain(session: &mut CaptureSession, events: &mut mpsc::UnboundedReceiver<ProgressEvent>) {
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::Snapshot(snapshot) => session.absorb(snapshot),
                ProgressEvent::StreamClosed => break,
                ProgressEvent::SegmentStarted { .. } => {}
            }
        }
    })
    .await;
}

fn log_summary(summary: &SessionSummary) {
    match summary.target {
        OutputTarget::Segments { ref dir, .. } => {
            tracing::info!("Stream segments saved to: {}", dir.display());
        }
        OutputTarget::File(ref path) => {
            tracing::info!("Stream capture completed: {}", path.display());
        }
    }
    tracing::info!("Total recording time: {}", format_hms(summary.recorded));
}

/// Per-run state. Owns the engine and kills it on drop unless it has been
/// reaped.
struct CaptureSession {
    process: Box<dyn EngineProcess>,
    reaped: bool,
    started: Instant,
    finished: Option<Instant>,
    snapshot: ProgressSnapshot,
    tail: VecDeque<String>,
    tail_capacity: usize,
    pending_stop: bool,
    stop_sent: bool,
    stop_kind: StopKind,
    stop_deadline: Option<Instant>,
    killed: bool,
    forced_by_user: bool,
    unresponsive: bool,
    last_interrupt: Option<Instant>,
}

impl CaptureSession {
    fn new(process: Box<dyn EngineProcess>, tail_capacity: usize) -> Self {
        Self {
            process,
            reaped: false,
            started: Instant::now(),
            finished: None,
            snapshot: ProgressSnapshot::default(),
            tail: VecDeque::with_capacity(tail_capacity),
            tail_capacity,
            pending_stop: false,
            stop_sent: false,
            stop_kind: StopKind::Graceful,
            stop_deadline: None,
            killed: false,
            forced_by_user: false,
            unresponsive: false,
            last_interrupt: None,
        }
    }

    /// Take the latest snapshot. Only log lines (stderr) are kept as crash
    /// context; `-progress` key/value blocks on stdout are not.
    fn absorb(&mut self, snapshot: ProgressSnapshot) {
        if let (Some(line), Some(StatusSource::Stderr)) = (&snapshot.last_line, snapshot.last_source) {
            if self.tail_capacity > 0 {
                if self.tail.len() == self.tail_capacity {
                    self.tail.pop_front();
                }
                self.tail.push_back(line.clone());
            }
        }
        self.snapshot = snapshot;
    }

    /// Force-terminate the engine; later calls do nothing.
    fn kill_once(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;
        self.process.force_kill()
    }

    fn tail(&self) -> Vec<String> {
        self.tail.iter().cloned().collect()
    }

    fn recorded(&self) -> Duration {
        self.finished
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.reaped {
            tracing::debug!("Session ended with the engine still running; killing it");
            if let Err(e) = self.process.force_kill() {
                tracing::warn!("Failed to kill engine: {}", e);
            }
        }
    }
}
