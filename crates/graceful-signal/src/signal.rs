//! Signal-based shutdown manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use graceful_config::{SignalConfig, TerminationSignal};
use graceful_core::{ShutdownError, ShutdownHandle, ShutdownManager};

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;

/// Name the signal manager reports to shutdown callbacks.
pub const SIGNAL_MANAGER_NAME: &str = "SignalManager";

/// What made the signal manager fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// An OS signal arrived.
    Received(TerminationSignal),
    /// Shutdown was requested programmatically.
    Requested,
}

impl std::fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalEvent::Received(signal) => write!(f, "{}", signal),
            SignalEvent::Requested => write!(f, "REQUESTED"),
        }
    }
}

/// Triggers shutdown on the first configured termination signal.
///
/// `on_shutdown_begin` does nothing. `on_shutdown_end` schedules a process
/// exit with the configured code for when the coordinator has finished its
/// whole sequence, unless `exit_on_finish` is off. Hooks of managers
/// registered after this one still run.
pub struct SignalManager {
    signals: Vec<TerminationSignal>,
    exit_code: i32,
    exit_on_finish: bool,
    sender: broadcast::Sender<SignalEvent>,
    shutdown_requested: Arc<AtomicBool>,
    handle: Mutex<Option<ShutdownHandle>>,
}

impl SignalManager {
    /// Create a manager for `signals`; an empty list means SIGINT and SIGTERM.
    pub fn new(signals: Vec<TerminationSignal>) -> Self {
        let signals = if signals.is_empty() {
            TerminationSignal::defaults()
        } else {
            signals
        };
        let (sender, _) = broadcast::channel(16);
        Self {
            signals,
            exit_code: 0,
            exit_on_finish: true,
            sender,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SignalConfig) -> Self {
        Self::new(config.signals.clone())
            .with_exit_code(config.exit_code)
            .with_exit_on_finish(config.exit_on_finish)
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_exit_on_finish(mut self, exit_on_finish: bool) -> Self {
        self.exit_on_finish = exit_on_finish;
        self
    }

    /// Signals this manager listens for.
    pub fn signals(&self) -> &[TerminationSignal] {
        &self.signals
    }

    /// Subscribe to trigger events.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.sender.subscribe()
    }

    /// Trigger shutdown as if a signal had arrived.
    ///
    /// A request made before `start` fires as soon as the manager starts.
    pub fn request_shutdown(&self) {
        self.send(SignalEvent::Requested);
    }

    /// Check if a signal or request has been seen.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    fn send(&self, event: SignalEvent) {
        debug!("Signal event: {}", event);
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let _ = self.sender.send(event);
    }

    /// Install OS signal handlers (Unix only).
    #[cfg(unix)]
    fn install(&self) -> Result<(), ShutdownError> {
        use tokio::signal::unix::signal;

        let mut streams = Vec::with_capacity(self.signals.len());
        for sig in &self.signals {
            let stream = signal(signal_kind(*sig))
                .map_err(|e| ShutdownError::SignalSetup(format!("{}: {}", sig, e)))?;
            streams.push((*sig, stream));
        }

        for (sig, mut stream) in streams {
            let sender = self.sender.clone();
            let requested = self.shutdown_requested.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!("Received {}", sig);
                    requested.store(true, Ordering::SeqCst);
                    let _ = sender.send(SignalEvent::Received(sig));
                }
            });
        }

        info!(
            "OS signal handlers installed ({})",
            self.signals
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Install OS signal handlers (non-Unix fallback).
    #[cfg(not(unix))]
    fn install(&self) -> Result<(), ShutdownError> {
        let sender = self.sender.clone();
        let requested = self.shutdown_requested.clone();

        // Only Ctrl+C is available on non-Unix
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                requested.store(true, Ordering::SeqCst);
                let _ = sender.send(SignalEvent::Received(TerminationSignal::Interrupt));
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new(TerminationSignal::defaults())
    }
}

#[async_trait::async_trait]
impl ShutdownManager for SignalManager {
    fn name(&self) -> &str {
        SIGNAL_MANAGER_NAME
    }

    async fn start(&self, handle: ShutdownHandle) -> Result<(), ShutdownError> {
        // Subscribe before checking the flag so no request slips between them.
        let mut rx = self.sender.subscribe();
        self.install()?;
        *self.handle.lock() = Some(handle.clone());

        let requested = self.shutdown_requested.clone();
        tokio::spawn(async move {
            if !requested.load(Ordering::SeqCst) {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            info!("{} - beginning shutdown", event);
                            break;
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return,
                    }
                }
            }
            handle.begin_shutdown().await;
        });

        Ok(())
    }

    async fn on_shutdown_begin(&self) -> Result<(), ShutdownError> {
        Ok(())
    }

    async fn on_shutdown_end(&self) -> Result<(), ShutdownError> {
        if !self.exit_on_finish {
            debug!("Shutdown finished, process exit disabled");
            return Ok(());
        }

        let exit_code = self.exit_code;
        let handle = self.handle.lock().clone();
        match handle {
            Some(handle) => {
                tokio::spawn(async move {
                    handle.wait_finished().await;
                    info!("Shutdown finished, exiting with code {}", exit_code);
                    std::process::exit(exit_code);
                });
            }
            None => {
                info!("Shutdown finished, exiting with code {}", exit_code);
                std::process::exit(exit_code);
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn signal_kind(signal: TerminationSignal) -> tokio::signal::unix::SignalKind {
    use tokio::signal::unix::SignalKind;

    match signal {
        TerminationSignal::Interrupt => SignalKind::interrupt(),
        TerminationSignal::Terminate => SignalKind::terminate(),
        TerminationSignal::Hangup => SignalKind::hangup(),
        TerminationSignal::Quit => SignalKind::quit(),
        TerminationSignal::User1 => SignalKind::user_defined1(),
        TerminationSignal::User2 => SignalKind::user_defined2(),
    }
}

/// Send a termination signal to a process.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: TerminationSignal) -> Result<(), ShutdownError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| ShutdownError::Custom(format!("Invalid PID: {}", pid)))?;

    let nix_signal = match signal {
        TerminationSignal::Interrupt => Signal::SIGINT,
        TerminationSignal::Terminate => Signal::SIGTERM,
        TerminationSignal::Hangup => Signal::SIGHUP,
        TerminationSignal::Quit => Signal::SIGQUIT,
        TerminationSignal::User1 => Signal::SIGUSR1,
        TerminationSignal::User2 => Signal::SIGUSR2,
    };

    kill(Pid::from_raw(raw), nix_signal).map_err(|e| {
        ShutdownError::Custom(format!("Failed to send {} to PID {}: {}", signal, pid, e))
    })?;

    info!("Sent {} to PID {}", signal, pid);
    Ok(())
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: TerminationSignal) -> Result<(), ShutdownError> {
    Err(ShutdownError::Custom(
        "Signal sending not supported on this platform".to_string(),
    ))
}
