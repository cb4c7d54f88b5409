//! # Graceful
//!
//! Graceful shutdown coordination for long-running services.
//!
//! Register managers (things that notice it is time to stop, such as OS
//! signals) and callbacks (cleanup work). When a manager fires, the
//! coordinator runs the callbacks and reports every failure to a single
//! error handler.
//!
//! Two coordinators are available, selected by [`ShutdownMode`]:
//!
//! - [`GracefulShutdown`] - the triggering manager brackets a concurrent
//!   run of all callbacks with its begin/end hooks
//! - [`SequentialShutdown`] - a cancellation token drives a sequential run
//!   of the callbacks followed by every manager's hooks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graceful::{Shutdown, TracingErrorHandler};
//!
//! let (shutdown, signals) = Shutdown::from_path(Path::new("graceful.toml"))?;
//! shutdown.set_error_handler(Arc::new(TracingErrorHandler));
//! shutdown.add_callback_fn(|manager| async move {
//!     tracing::info!("flushing buffers ({manager})");
//!     Ok(())
//! });
//! shutdown.start().await?;
//! shutdown.wait_finished().await;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

pub use graceful_config::{
    Config, ConfigError, ConfigLoader, ConfigValidator, CoordinatorConfig, ShutdownMode,
    SignalConfig, TerminationSignal, ValidationResult,
};
pub use graceful_core::{
    CoordinatorState, ErrorFn, ErrorHandler, GracefulShutdown, SequentialShutdown,
    ShutdownCallback, ShutdownCoordinator, ShutdownError, ShutdownFn, ShutdownHandle,
    ShutdownManager, TracingErrorHandler,
};
pub use graceful_signal::{send_signal, SignalEvent, SignalManager, SIGNAL_MANAGER_NAME};

/// A shutdown coordinator of either flavour.
#[derive(Clone)]
pub enum Shutdown {
    ConcurrentBarrier(GracefulShutdown),
    SequentialOnCancel(SequentialShutdown),
}

impl Shutdown {
    /// Create a coordinator for `mode` with default settings.
    pub fn new(mode: ShutdownMode) -> Self {
        Self::from_config(&CoordinatorConfig {
            mode,
            ..Default::default()
        })
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        match config.mode {
            ShutdownMode::ConcurrentBarrier => {
                Shutdown::ConcurrentBarrier(GracefulShutdown::from_config(config))
            }
            ShutdownMode::SequentialOnCancel => {
                Shutdown::SequentialOnCancel(SequentialShutdown::from_config(config))
            }
        }
    }

    /// Load a TOML file, validate it, and build the coordinator with a
    /// [`SignalManager`] already registered.
    pub fn from_path(path: &Path) -> Result<(Self, Arc<SignalManager>), ConfigError> {
        let config = ConfigLoader::load(path)?;
        let validation = ConfigValidator::ensure_valid(&config)?;
        for warning in &validation.warnings {
            warn!("Config warning at {}: {}", warning.path, warning.message);
        }

        let shutdown = Self::from_config(&config.coordinator);
        let signals = Arc::new(SignalManager::from_config(&config.signal));
        shutdown.add_manager(signals.clone());

        info!(
            "Shutdown coordinator '{}' configured ({})",
            shutdown.name(),
            shutdown.mode()
        );
        Ok((shutdown, signals))
    }

    pub fn mode(&self) -> ShutdownMode {
        match self {
            Shutdown::ConcurrentBarrier(_) => ShutdownMode::ConcurrentBarrier,
            Shutdown::SequentialOnCancel(_) => ShutdownMode::SequentialOnCancel,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.name(),
            Shutdown::SequentialOnCancel(ss) => ss.name(),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.state(),
            Shutdown::SequentialOnCancel(ss) => ss.state(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().is_shutdown()
    }

    /// Name of the manager that triggered shutdown, once one has.
    pub fn trigger_name(&self) -> Option<String> {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.trigger_name(),
            Shutdown::SequentialOnCancel(ss) => ss.trigger_name(),
        }
    }

    pub fn add_manager(&self, manager: Arc<dyn ShutdownManager>) {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.add_manager(manager),
            Shutdown::SequentialOnCancel(ss) => ss.add_manager(manager),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.add_callback(callback),
            Shutdown::SequentialOnCancel(ss) => ss.add_callback(callback),
        }
    }

    pub fn add_callback_fn<F, Fut>(&self, f: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        self.add_callback(Arc::new(ShutdownFn::new(f)));
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.set_error_handler(handler),
            Shutdown::SequentialOnCancel(ss) => ss.set_error_handler(handler),
        }
    }

    /// Start every registered manager; fails on the first manager error.
    pub async fn start(&self) -> Result<(), ShutdownError> {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.start().await,
            Shutdown::SequentialOnCancel(ss) => ss.start().await,
        }
    }

    pub fn report_error(&self, err: ShutdownError) {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.report_error(err),
            Shutdown::SequentialOnCancel(ss) => ss.report_error(err),
        }
    }

    /// Wait until the shutdown sequence has finished.
    pub async fn wait_finished(&self) {
        match self {
            Shutdown::ConcurrentBarrier(gs) => gs.wait_finished().await,
            Shutdown::SequentialOnCancel(ss) => ss.wait_finished().await,
        }
    }

    pub fn as_concurrent(&self) -> Option<&GracefulShutdown> {
        match self {
            Shutdown::ConcurrentBarrier(gs) => Some(gs),
            Shutdown::SequentialOnCancel(_) => None,
        }
    }

    pub fn as_sequential(&self) -> Option<&SequentialShutdown> {
        match self {
            Shutdown::ConcurrentBarrier(_) => None,
            Shutdown::SequentialOnCancel(ss) => Some(ss),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::ConcurrentBarrier(GracefulShutdown::new())
    }
}

impl From<GracefulShutdown> for Shutdown {
    fn from(gs: GracefulShutdown) -> Self {
        Shutdown::ConcurrentBarrier(gs)
    }
}

impl From<SequentialShutdown> for Shutdown {
    fn from(ss: SequentialShutdown) -> Self {
        Shutdown::SequentialOnCancel(ss)
    }
}
