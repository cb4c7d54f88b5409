//! Shutdown managers and the handle they use to reach the coordinator.

use std::sync::Arc;

use crate::callback::ShutdownCallback;
use crate::error::ShutdownError;

/// A trigger source that decides when shutdown begins.
///
/// `start` should hand the listening off to a background task and return
/// quickly. When the trigger fires, the manager calls
/// [`ShutdownHandle::begin_shutdown`].
#[async_trait::async_trait]
pub trait ShutdownManager: Send + Sync {
    /// Name passed to every callback when this manager triggers shutdown.
    fn name(&self) -> &str;

    /// Begin listening for the trigger.
    async fn start(&self, handle: ShutdownHandle) -> Result<(), ShutdownError>;

    /// Runs before any callback.
    async fn on_shutdown_begin(&self) -> Result<(), ShutdownError>;

    /// Runs after every callback has returned.
    async fn on_shutdown_end(&self) -> Result<(), ShutdownError>;
}

/// The coordinator as seen by managers.
#[async_trait::async_trait]
pub trait ShutdownCoordinator: Send + Sync {
    /// Begin shutdown with `manager` as the trigger.
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>);

    /// Forward an error to the error handler, if one is set.
    fn report_error(&self, err: ShutdownError);

    /// Register another callback.
    fn add_callback(&self, callback: Arc<dyn ShutdownCallback>);

    /// Resolve once the shutdown sequence has finished.
    async fn wait_finished(&self);
}

/// Handle given to a manager on start, bound to that manager.
///
/// The coordinators hand out a coordinator view that does not keep the
/// coordinator alive, so a manager storing its handle creates no cycle.
/// Once the coordinator is dropped, every handle call is a no-op.
#[derive(Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<dyn ShutdownCoordinator>,
    manager: Arc<dyn ShutdownManager>,
}

impl ShutdownHandle {
    pub fn new(coordinator: Arc<dyn ShutdownCoordinator>, manager: Arc<dyn ShutdownManager>) -> Self {
        Self {
            coordinator,
            manager,
        }
    }

    /// Name of the manager this handle belongs to.
    pub fn manager_name(&self) -> &str {
        self.manager.name()
    }

    /// Begin shutdown with the owning manager as the trigger.
    pub async fn begin_shutdown(&self) {
        self.coordinator.start_shutdown(self.manager.clone()).await;
    }

    pub fn report_error(&self, err: ShutdownError) {
        self.coordinator.report_error(err);
    }

    pub fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        self.coordinator.add_callback(callback);
    }

    /// Wait until the coordinator's shutdown sequence has finished.
    pub async fn wait_finished(&self) {
        self.coordinator.wait_finished().await;
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("manager", &self.manager.name())
            .finish()
    }
}
