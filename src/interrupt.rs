//! User interrupts.
//!
//! Interrupts reach the session controller through an explicit channel
//! rather than a process-global handler, so tests can inject them and the
//! controller sees them strictly in arrival order.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where an interrupt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Ctrl+C at the terminal (SIGINT).
    CtrlC,
    /// SIGTERM from a service manager or `kill`.
    Terminate,
    /// Requested programmatically.
    Requested,
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::CtrlC => f.write_str("Ctrl+C"),
            Interrupt::Terminate => f.write_str("SIGTERM"),
            Interrupt::Requested => f.write_str("stop request"),
        }
    }
}

/// Sending side of the interrupt channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: mpsc::UnboundedSender<Interrupt>,
}

impl InterruptHandle {
    /// Deliver an interrupt. Returns `false` once the receiving session is
    /// gone.
    pub fn send(&self, interrupt: Interrupt) -> bool {
        self.tx.send(interrupt).is_ok()
    }

    /// Shorthand for `send(Interrupt::Requested)`.
    pub fn request_stop(&self) -> bool {
        self.send(Interrupt::Requested)
    }
}

/// Receiving side, owned by the session controller.
#[derive(Debug)]
pub struct Interrupts {
    rx: mpsc::UnboundedReceiver<Interrupt>,
}

impl Interrupts {
    /// Next interrupt, or `None` once every handle has been dropped.
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Option<Interrupt> {
        self.rx.recv().await
    }
}

/// Create a connected handle/receiver pair.
pub fn channel() -> (InterruptHandle, Interrupts) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InterruptHandle { tx }, Interrupts { rx })
}

/// Translate Ctrl+C and SIGTERM into interrupts on `handle` until `cancel`
/// fires or the receiver goes away. Must be called from within a tokio
/// runtime.
///
/// The listeners are installed before this returns, so a signal raised right
/// after the call is not lost. Installing them replaces the default
/// "terminate the process" action: from here on every press is routed to the
/// controller.
pub fn forward_os_signals(handle: InterruptHandle, cancel: CancellationToken) -> JoinHandle<()> {
    let mut signals = OsSignals::install();

    tokio::spawn(async move {
        loop {
            let interrupt = tokio::select! {
                _ = cancel.cancelled() => break,
                next = signals.recv() => match next {
                    Some(interrupt) => interrupt,
                    None => break,
                },
            };

            tracing::debug!("Received {}", interrupt);
            if !handle.send(interrupt) {
                break;
            }
        }
    })
}

/// Signal streams that live as long as the forwarder, so deliveries between
/// two `recv` calls are queued rather than dropped.
struct OsSignals {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(windows)]
    ctrl_c: Option<tokio::signal::windows::CtrlC>,
}

impl OsSignals {
    #[cfg(unix)]
    fn install() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        Self {
            interrupt: listen("SIGINT", signal(SignalKind::interrupt())),
            terminate: listen("SIGTERM", signal(SignalKind::terminate())),
        }
    }

    #[cfg(windows)]
    fn install() -> Self {
        Self {
            ctrl_c: listen("Ctrl+C", tokio::signal::windows::ctrl_c()),
        }
    }

    /// Next signal, or `None` when no listener could be installed.
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<Interrupt> {
        if self.interrupt.is_none() && self.terminate.is_none() {
            return None;
        }
        tokio::select! {
            Some(()) = next_signal(&mut self.interrupt) => Some(Interrupt::CtrlC),
            Some(()) = next_signal(&mut self.terminate) => Some(Interrupt::Terminate),
            else => None,
        }
    }

    #[cfg(windows)]
    async fn recv(&mut self) -> Option<Interrupt> {
        self.ctrl_c.as_mut()?.recv().await.map(|()| Interrupt::CtrlC)
    }

    #[cfg(not(any(unix, windows)))]
    fn install() -> Self {
        Self {}
    }

    #[cfg(not(any(unix, windows)))]
    async fn recv(&mut self) -> Option<Interrupt> {
        None
    }
}

#[cfg(any(unix, windows))]
fn listen<S>(name: &str, installed: std::io::Result<S>) -> Option<S> {
    match installed {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!("Failed to install {} handler: {}", name, e);
            None
        }
    }
}

/// Wait on an optional stream; a missing one never fires.
#[cfg(unix)]
async fn next_signal(stream: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match stream {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupts_arrive_in_order() {
        let (handle, mut interrupts) = channel();
        let other = handle.clone();

        assert!(handle.send(Interrupt::CtrlC));
        assert!(other.send(Interrupt::Terminate));
        assert!(handle.request_stop());

        assert_eq!(interrupts.recv().await, Some(Interrupt::CtrlC));
        assert_eq!(interrupts.recv().await, Some(Interrupt::Terminate));
        assert_eq!(interrupts.recv().await, Some(Interrupt::Requested));
    }

    #[tokio::test]
    async fn closed_when_handles_dropped() {
        let (handle, mut interrupts) = channel();
        drop(handle);
        assert_eq!(interrupts.recv().await, None);
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (handle, interrupts) = channel();
        drop(interrupts);
        assert!(!handle.request_stop());
    }

    #[tokio::test]
    async fn forwarder_stops_on_cancel() {
        let (handle, _interrupts) = channel();
        let cancel = CancellationToken::new();
        let task = forward_os_signals(handle, cancel.clone());

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("forwarder did not stop")
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_raised_right_after_install_is_delivered() {
        let (handle, mut interrupts) = channel();
        let cancel = CancellationToken::new();
        let task = forward_os_signals(handle, cancel.clone());

        // Raised before the forwarding task has been polled even once.
        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), interrupts.recv())
            .await
            .expect("SIGINT was not forwarded");
        assert_eq!(received, Some(Interrupt::CtrlC));

        cancel.cancel();
        task.await.unwrap();
    }
}
