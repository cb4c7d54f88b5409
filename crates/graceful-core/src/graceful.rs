//! Manager-triggered shutdown with concurrent callbacks.
//!
//! The triggering manager's `on_shutdown_begin` runs first, then every
//! callback runs as its own task, and the sequence waits for all of them
//! before calling the manager's `on_shutdown_end`. Failures at any step are
//! reported to the error handler and never stop the remaining steps.
//!
//! Registries are expected to be complete before [`GracefulShutdown::start`].
//! Later registrations are accepted with a warning and are not seen by a
//! shutdown that is already running.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use graceful_config::CoordinatorConfig;

use crate::callback::{panic_message, run_callback, ShutdownCallback, ShutdownFn};
use crate::error::ShutdownError;
use crate::handler::ErrorHandler;
use crate::manager::{ShutdownCoordinator, ShutdownHandle, ShutdownManager};
use crate::registry::Registry;
use crate::state::CoordinatorState;

#[cfg(test)]
#[path = "graceful_tests.rs"]
mod tests;

struct Inner {
    name: String,
    state: AtomicU8,
    guarded: bool,
    callback_timeout: Option<Duration>,
    registry: Registry,
    trigger: Mutex<Option<String>>,
    /// Episodes currently running; only exceeds 1 when unguarded.
    episodes: Mutex<usize>,
    finished: CancellationToken,
}

/// Coordinator running callbacks concurrently behind a barrier.
///
/// Cheap to clone; clones share the same registries and state.
#[derive(Clone)]
pub struct GracefulShutdown {
    inner: Arc<Inner>,
}

impl GracefulShutdown {
    /// Create a coordinator with default settings: guarded, no callback deadline.
    pub fn new() -> Self {
        Self::from_config(&CoordinatorConfig::default())
    }

    /// Create a coordinator from configuration.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: config.name.clone(),
                state: AtomicU8::new(CoordinatorState::Created as u8),
                guarded: config.guard_repeated_triggers,
                callback_timeout: config.callback_timeout(),
                registry: Registry::default(),
                trigger: Mutex::new(None),
                episodes: Mutex::new(0),
                finished: CancellationToken::new(),
            }),
        }
    }

    /// Name of this coordinator.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the current state.
    pub fn state(&self) -> CoordinatorState {
        CoordinatorState::from(self.inner.state.load(Ordering::SeqCst))
    }

    /// Check whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.state().is_shutdown()
    }

    /// Name of the manager that triggered the current shutdown episode.
    pub fn trigger_name(&self) -> Option<String> {
        self.inner.trigger.lock().clone()
    }

    pub fn manager_count(&self) -> usize {
        self.inner.registry.manager_count()
    }

    pub fn callback_count(&self) -> usize {
        self.inner.registry.callback_count()
    }

    /// Register a manager. Managers start in registration order.
    pub fn add_manager(&self, manager: Arc<dyn ShutdownManager>) {
        self.warn_if_late("manager");
        self.inner.registry.add_manager(manager);
    }

    /// Register a callback.
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

    /// Set the error handler. Without one, shutdown errors are dropped.
    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.inner.registry.set_error_handler(handler);
    }

    /// Start every manager in registration order.
    ///
    /// Stops at the first manager that fails and returns its error. Managers
    /// started before it keep running.
    pub async fn start(&self) -> Result<(), ShutdownError> {
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

        info!("Shutdown coordinator running");
        Ok(())
    }

    /// Run the shutdown sequence with `manager` as the trigger.
    ///
    /// Returns once the post-hook has run. When guarded, a call made while
    /// a shutdown is running or after it finished returns immediately
    /// without waiting; use [`GracefulShutdown::wait_finished`] to join.
    ///
    /// When unguarded, overlapping episodes may run. The coordinator only
    /// reaches `Completed`, and `wait_finished` only resolves, once the last
    /// running episode is done.
    pub async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        if !self.begin_episode(manager.name()) {
            return;
        }

        let trigger = manager.name().to_string();
        *self.inner.trigger.lock() = Some(trigger.clone());
        info!("Shutdown triggered by {}", trigger);

        self.report_result(manager.on_shutdown_begin().await);

        self.run_callbacks(&trigger).await;

        self.report_result(manager.on_shutdown_end().await);

        self.end_episode();
    }

    fn begin_episode(&self, trigger: &str) -> bool {
        let mut episodes = self.inner.episodes.lock();
        let current = self.state();
        if self.inner.guarded && current.is_shutdown() {
            debug!(
                "Shutdown already {} - ignoring trigger from {}",
                current, trigger
            );
            return false;
        }
        *episodes += 1;
        self.inner
            .state
            .store(CoordinatorState::ShuttingDown as u8, Ordering::SeqCst);
        true
    }

    fn end_episode(&self) {
        let mut episodes = self.inner.episodes.lock();
        *episodes -= 1;
        if *episodes > 0 {
            debug!("Shutdown episode finished, {} still running", *episodes);
            return;
        }
        self.inner
            .state
            .store(CoordinatorState::Completed as u8, Ordering::SeqCst);
        self.inner.finished.cancel();
        info!("Shutdown sequence finished");
    }

    /// Launch every callback as a task and wait for all of them.
    async fn run_callbacks(&self, trigger: &str) {
        let callbacks = self.inner.registry.callbacks();
        debug!("Running {} shutdown callbacks", callbacks.len());

        let mut tasks = JoinSet::new();
        for callback in callbacks {
            let trigger = trigger.to_string();
            let deadline = self.inner.callback_timeout;
            tasks.spawn(async move { run_callback(callback.as_ref(), &trigger, deadline).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => self.report_result(result),
                Err(e) if e.is_panic() => {
                    let payload = e.into_panic();
                    self.report_error(ShutdownError::Panicked(panic_message(payload.as_ref())));
                }
                Err(e) => self.report_error(ShutdownError::custom(e.to_string())),
            }
        }
    }

    /// Forward an error to the error handler, if one is set.
    pub fn report_error(&self, err: ShutdownError) {
        debug!("Reporting shutdown error: {}", err);
        self.inner.registry.report_error(err);
    }

    fn report_result(&self, result: Result<(), ShutdownError>) {
        if let Err(err) = result {
            self.report_error(err);
        }
    }

    /// Wait until a shutdown sequence has finished.
    pub async fn wait_finished(&self) {
        self.inner.finished.cancelled().await;
    }

    fn warn_if_late(&self, what: &str) {
        if self.is_shutting_down() {
            warn!(
                "Registering a shutdown {} after shutdown began; it will not run in the current sequence",
                what
            );
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ShutdownCoordinator for GracefulShutdown {
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        GracefulShutdown::start_shutdown(self, manager).await;
    }

    fn report_error(&self, err: ShutdownError) {
        GracefulShutdown::report_error(self, err);
    }

    fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        GracefulShutdown::add_callback(self, callback);
    }

    async fn wait_finished(&self) {
        GracefulShutdown::wait_finished(self).await;
    }
}

/// Coordinator view given to managers; holds the coordinator weakly.
struct CoordinatorRef(Weak<Inner>);

impl CoordinatorRef {
    fn upgrade(&self) -> Option<GracefulShutdown> {
        self.0.upgrade().map(|inner| GracefulShutdown { inner })
    }
}

#[async_trait::async_trait]
impl ShutdownCoordinator for CoordinatorRef {
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        match self.upgrade() {
            Some(gs) => gs.start_shutdown(manager).await,
            None => debug!("Coordinator dropped - ignoring trigger from {}", manager.name()),
        }
    }

    fn report_error(&self, err: ShutdownError) {
        match self.upgrade() {
            Some(gs) => gs.report_error(err),
            None => debug!("Coordinator dropped, dropping: {}", err),
        }
    }

    fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        if let Some(gs) = self.upgrade() {
            gs.add_callback(callback);
        }
    }

    async fn wait_finished(&self) {
        if let Some(gs) = self.upgrade() {
            gs.wait_finished().await;
        }
    }
}
