//! Progress reporting from the engine's status stream.
//!
//! Reader tasks drain the child's stdout and stderr into an unbounded queue
//! so the engine never blocks on a full pipe. A single reporter task
//! classifies each line, maintains the current segment index and publishes
//! [`ProgressEvent`]s to the session controller. The reporter only publishes
//! immutable snapshots; it never touches the controller's session state.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use hg_core::format_hms;

use crate::status::{StatusClassifier, StatusLine};

/// Log target for raw engine output.
pub const ENGINE_LOG_TARGET: &str = "hlsgrab::engine";

/// Point-in-time view of capture progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Wall-clock time since the reporter started.
    pub elapsed: Duration,
    /// Index of the segment currently being written, when segmenting.
    pub segment: Option<u32>,
    /// Wall-clock time since the current segment was opened.
    pub segment_elapsed: Option<Duration>,
    /// Media timestamp most recently reported by the engine.
    pub out_time: Option<Duration>,
    /// The most recent raw status line.
    pub last_line: Option<String>,
    /// Pipe `last_line` was read from.
    pub last_source: Option<StatusSource>,
}

/// Events published to the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A status line arrived; carries the updated snapshot.
    Snapshot(ProgressSnapshot),
    /// The engine started writing a new segment.
    SegmentStarted {
        /// Index of the segment now being written.
        index: u32,
        /// Index of the segment that was just finished.
        previous: u32,
        /// How long the finished segment was being written.
        previous_duration: Duration,
    },
    /// Both output pipes have closed.
    StreamClosed,
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    Stdout,
    Stderr,
}

/// Tunables for the reporter task.
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    /// Interval between progress lines in the log.
    pub progress_interval: Duration,
    /// Log every raw engine line at debug level.
    pub verbose: bool,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(5),
            verbose: false,
        }
    }
}

/// Turns classified status lines into snapshots and segment events.
#[derive(Debug)]
pub struct ProgressReporter {
    classifier: StatusClassifier,
    started: Instant,
    segment: Option<u32>,
    segment_started: Instant,
    out_time: Option<Duration>,
    last_line: Option<String>,
    last_source: Option<StatusSource>,
}

impl ProgressReporter {
    pub fn new(classifier: StatusClassifier, started: Instant) -> Self {
        Self {
            classifier,
            started,
            segment: None,
            segment_started: started,
            out_time: None,
            last_line: None,
            last_source: None,
        }
    }

    /// Feed one raw line read from `source`. Returns the refreshed snapshot and, when the line
    /// marks the start of a segment with a higher index than the current
    /// one, the corresponding [`ProgressEvent::SegmentStarted`].
    ///
    /// The first segment opening only establishes the current index.
    pub fn observe(
        &mut self,
        source: StatusSource,
        line: &str,
        now: Instant,
    ) -> (ProgressSnapshot, Option<ProgressEvent>) {
        let mut boundary = None;

        match self.classifier.classify(line) {
            StatusLine::Progress { out_time } => self.out_time = Some(out_time),
            StatusLine::SegmentBoundary { index } => match self.segment {
                None => {
                    self.segment = Some(index);
                    self.segment_started = now;
                }
                Some(current) if index > current => {
                    boundary = Some(ProgressEvent::SegmentStarted {
                        index,
                        previous: current,
                        previous_duration: now.saturating_duration_since(self.segment_started),
                    });
                    self.segment = Some(index);
                    self.segment_started = now;
                }
                // A repeated or older index is not a new segment.
                Some(_) => {}
            },
            StatusLine::Unrecognized => {}
        }

        self.last_line = Some(line.to_string());
        self.last_source = Some(source);
        (self.snapshot(now), boundary)
    }

    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            elapsed: now.saturating_duration_since(self.started),
            segment: self.segment,
            segment_elapsed: self
                .segment
                .map(|_| now.saturating_duration_since(self.segment_started)),
            out_time: self.out_time,
            last_line: self.last_line.clone(),
            last_source: self.last_source,
        }
    }
}

/// Render the periodic progress line.
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    match (snapshot.segment, snapshot.segment_elapsed) {
        (Some(index), Some(seg)) => format!(
            "Recording: {} (segment {index}: {})",
            format_hms(snapshot.elapsed),
            format_hms(seg)
        ),
        _ => format!("Recording: {}", format_hms(snapshot.elapsed)),
    }
}

/// Handle to the reader and reporter tasks; aborts them when dropped.
#[derive(Debug)]
pub struct ReporterTask {
    handles: Vec<JoinHandle<()>>,
}

impl ReporterTask {
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for ReporterTask {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Spawn reader tasks for the given pipes and the reporter task consuming
/// them. Must be called from within a tokio runtime.
pub fn spawn_reporter<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    classifier: StatusClassifier,
    settings: ReporterSettings,
) -> (mpsc::UnboundedReceiver<ProgressEvent>, ReporterTask)
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut handles = Vec::with_capacity(3);

    if let Some(out) = stdout {
        handles.push(tokio::spawn(read_lines(out, StatusSource::Stdout, line_tx.clone())));
    }
    if let Some(err) = stderr {
        handles.push(tokio::spawn(read_lines(err, StatusSource::Stderr, line_tx.clone())));
    }
    drop(line_tx);

    let reporter = ProgressReporter::new(classifier, Instant::now());
    handles.push(tokio::spawn(run_reporter(reporter, line_rx, event_tx, settings)));

    (event_rx, ReporterTask { handles })
}

async fn read_lines<R>(pipe: R, source: StatusSource, tx: mpsc::UnboundedSender<(StatusSource, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                if tx.send((source, line.to_string())).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Engine {:?} read error: {}", source, e);
                break;
            }
        }
    }
}

async fn run_reporter(
    mut reporter: ProgressReporter,
    mut lines: mpsc::UnboundedReceiver<(StatusSource, String)>,
    events: mpsc::UnboundedSender<ProgressEvent>,
    settings: ReporterSettings,
) {
    let mut ticker = tokio::time::interval_at(
        Instant::now() + settings.progress_interval,
        settings.progress_interval,
    );

    loop {
        tokio::select! {
            next = lines.recv() => {
                let Some((source, line)) = next else { break };

                if settings.verbose {
                    tracing::debug!(target: ENGINE_LOG_TARGET, "[{:?}] {}", source, line);
                }
                let lower = line.to_lowercase();
                if source == StatusSource::Stderr
                    && (lower.contains("error") || lower.contains("warning"))
                {
                    tracing::warn!(target: ENGINE_LOG_TARGET, "{}", line);
                }

                let (snapshot, boundary) = reporter.observe(source, &line, Instant::now());
                if events.send(ProgressEvent::Snapshot(snapshot)).is_err() {
                    return;
                }
                if let Some(event) = boundary {
                    if let ProgressEvent::SegmentStarted { previous, previous_duration, .. } = &event {
                        tracing::info!(
                            "Segment {} completed (duration: {})",
                            previous,
                            format_hms(*previous_duration)
                        );
                    }
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                tracing::info!("{}", progress_line(&reporter.snapshot(Instant::now())));
            }
        }
    }

    let _ = events.send(ProgressEvent::StreamClosed);
}
