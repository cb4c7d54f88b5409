//! Cancellation-driven shutdown with sequential callbacks.
//!
//! [`SequentialShutdown::start`] starts the managers and spawns a task that
//! waits on a cancellation token. [`SequentialShutdown::trigger_shutdown`]
//! cancels it once; later calls are no-ops. When the token fires the task
//! runs every callback in registration order, then `on_shutdown_begin` on
//! every manager, then `on_shutdown_end` on every manager.
//!
//! Unlike [`crate::GracefulShutdown`], a trigger does not wait for the
//! sequence; use [`SequentialShutdown::wait_finished`] to join it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use graceful_config::CoordinatorConfig;

use crate::callback::{run_callback, ShutdownCallback, ShutdownFn};
use crate::error::ShutdownError;
use crate::handler::ErrorHandler;
use crate::manager::{ShutdownCoordinator, ShutdownHandle, ShutdownManager};
use crate::registry::Registry;
use crate::state::CoordinatorState;

#[cfg(test)]
#[path = "sequential_tests.rs"]
mod tests;

#[derive(Default)]
struct TriggerFlag {
    started: bool,
    trigger: Option<String>,
}

struct Inner {
    name: String,
    state: AtomicU8,
    callback_timeout: Option<Duration>,
    registry: Registry,
    flag: Mutex<TriggerFlag>,
    token: CancellationToken,
    finished: CancellationToken,
}

/// Coordinator running callbacks one at a time once its token is cancelled.
#[derive(Clone)]
pub struct SequentialShutdown {
    inner: Arc<Inner>,
}

impl SequentialShutdown {
    /// Create a coordinator; `name` is passed to callbacks when no manager
    /// triggered the shutdown.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(&CoordinatorConfig {
            name: name.into(),
            ..Default::default()
        })
    }

    /// Create a coordinator from configuration.
    ///
    /// `guard_repeated_triggers` does not apply: this variant always runs
    /// its sequence at most once.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: config.name.clone(),
                state: AtomicU8::new(CoordinatorState::Created as u8),
                callback_timeout: config.callback_timeout(),
                registry: Registry::default(),
                flag: Mutex::new(TriggerFlag::default()),
                token: CancellationToken::new(),
                finished: CancellationToken::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> CoordinatorState {
        CoordinatorState::from(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().is_shutdown()
    }

    /// Name of the manager that triggered shutdown, if any did.
    pub fn trigger_name(&self) -> Option<String> {
        self.inner.flag.lock().trigger.clone()
    }

    pub fn manager_count(&self) -> usize {
        self.inner.registry.manager_count()
    }

    pub fn callback_count(&self) -> usize {
        self.inner.registry.callback_count()
    }

    pub fn add_manager(&self, manager: Arc<dyn ShutdownManager>) {
        self.warn_if_late("manager");
        self.inner.registry.add_manager(manager);
    }

    pub fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        self.warn_if_late("callback");
        self.inner.registry.add_callback(callback);
    }

    /// Register an async closure as a callback.
    pub fn add_callback_fn<F, Fut>(&self, f: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        self.add_callback(Arc::new(ShutdownFn::new(f)));
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.inner.registry.set_error_handler(handler);
    }

    /// Start with no outer cancellation.
    pub async fn start(&self) -> Result<(), ShutdownError> {
        self.start_with_parent(CancellationToken::new()).await
    }

    /// Start the managers and wait in the background for either `parent` or
    /// the coordinator's own token to be cancelled.
    ///
    /// Fails fast on the first manager error; the background task is only
    /// spawned once every manager has started.
    pub async fn start_with_parent(&self, parent: CancellationToken) -> Result<(), ShutdownError> {
        let transition = self.inner.state.compare_exchange(
            CoordinatorState::Created as u8,
            CoordinatorState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Err(current) = transition {
            return Err(ShutdownError::InvalidStateTransition {
                from: CoordinatorState::from(current),
                to: CoordinatorState::Running,
            });
        }

        let managers = self.inner.registry.managers();
        info!("Starting {} shutdown managers...", managers.len());

        let coordinator: Arc<dyn ShutdownCoordinator> =
            Arc::new(CoordinatorRef(Arc::downgrade(&self.inner)));
        for manager in managers {
            let handle = ShutdownHandle::new(coordinator.clone(), manager.clone());
            if let Err(e) = manager.start(handle).await {
                error!("Failed to start shutdown manager {}: {}", manager.name(), e);
                return Err(e);
            }
            debug!("Shutdown manager {} started", manager.name());
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.token.cancelled() => {}
                _ = parent.cancelled() => {
                    debug!("Parent token cancelled");
                }
            }
            Self::run_sequence(&inner).await;
        });

        info!("Shutdown coordinator running");
        Ok(())
    }

    /// Request shutdown without naming a triggering manager.
    pub fn trigger_shutdown(&self) {
        self.request(None);
    }

    fn request(&self, trigger: Option<String>) {
        let mut flag = self.inner.flag.lock();
        if flag.started {
            debug!("Shutdown already requested - ignoring");
            return;
        }
        flag.started = true;
        flag.trigger = trigger;
        info!(
            "Shutdown requested by {}",
            flag.trigger.as_deref().unwrap_or(&self.inner.name)
        );
        self.inner.token.cancel();
    }

    async fn run_sequence(inner: &Inner) {
        inner
            .state
            .store(CoordinatorState::ShuttingDown as u8, Ordering::SeqCst);
        // A parent cancellation bypasses `request`, so mark the episode here.
        let trigger = {
            let mut flag = inner.flag.lock();
            flag.started = true;
            flag.trigger.clone().unwrap_or_else(|| inner.name.clone())
        };
        info!("Running shutdown sequence ({})", trigger);

        for callback in inner.registry.callbacks() {
            let result = run_callback(callback.as_ref(), &trigger, inner.callback_timeout).await;
            Self::report(inner, result);
        }

        let managers = inner.registry.managers();
        for manager in &managers {
            Self::report(inner, manager.on_shutdown_begin().await);
        }
        for manager in &managers {
            Self::report(inner, manager.on_shutdown_end().await);
        }

        inner
            .state
            .store(CoordinatorState::Completed as u8, Ordering::SeqCst);
        inner.finished.cancel();
        info!("Shutdown sequence finished");
    }

    fn report(inner: &Inner, result: Result<(), ShutdownError>) {
        if let Err(err) = result {
            debug!("Reporting shutdown error: {}", err);
            inner.registry.report_error(err);
        }
    }

    pub fn report_error(&self, err: ShutdownError) {
        Self::report(&self.inner, Err(err));
    }

    /// Wait until the shutdown sequence has finished.
    pub async fn wait_finished(&self) {
        self.inner.finished.cancelled().await;
    }

    fn warn_if_late(&self, what: &str) {
        if self.is_shutting_down() || self.inner.flag.lock().started {
            warn!(
                "Registering a shutdown {} after shutdown was requested; it may not run",
                what
            );
        }
    }
}

#[async_trait::async_trait]
impl ShutdownCoordinator for SequentialShutdown {
    /// Cancels the token with `manager` as the trigger; does not wait.
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        self.request(Some(manager.name().to_string()));
    }

    fn report_error(&self, err: ShutdownError) {
        SequentialShutdown::report_error(self, err);
    }

    fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        SequentialShutdown::add_callback(self, callback);
    }

    async fn wait_finished(&self) {
        SequentialShutdown::wait_finished(self).await;
    }
}

/// Coordinator view given to managers; holds the coordinator weakly.
struct CoordinatorRef(Weak<Inner>);

impl CoordinatorRef {
    fn upgrade(&self) -> Option<SequentialShutdown> {
        self.0.upgrade().map(|inner| SequentialShutdown { inner })
    }
}

#[async_trait::async_trait]
impl ShutdownCoordinator for CoordinatorRef {
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        match self.upgrade() {
            Some(ss) => ss.request(Some(manager.name().to_string())),
            None => debug!("Coordinator dropped - ignoring trigger from {}", manager.name()),
        }
    }

    fn report_error(&self, err: ShutdownError) {
        match self.upgrade() {
            Some(ss) => ss.report_error(err),
            None => debug!("Coordinator dropped, dropping: {}", err),
        }
    }

    fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        if let Some(ss) = self.upgrade() {
            ss.add_callback(callback);
        }
    }

    async fn wait_finished(&self) {
        if let Some(ss) = self.upgrade() {
            ss.wait_finished().await;
        }
    }
}
