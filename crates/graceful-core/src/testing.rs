//! Test doubles shared by the coordinator tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ShutdownError;
use crate::handler::{ErrorFn, ErrorHandler};
use crate::manager::{ShutdownHandle, ShutdownManager};

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Error handler recording every message it receives.
pub(crate) fn recording_handler() -> (Arc<dyn ErrorHandler>, EventLog) {
    let log = event_log();
    let sink = log.clone();
    let handler = ErrorFn::new(move |err: ShutdownError| sink.lock().push(err.to_string()));
    (Arc::new(handler), log)
}

#[derive(Default, Clone, Copy)]
pub(crate) struct Failures {
    pub start: bool,
    pub begin: bool,
    pub end: bool,
}

/// Manager that records its lifecycle and keeps the handle it was started with.
pub(crate) struct TestManager {
    name: String,
    log: EventLog,
    failures: Failures,
    handle: Mutex<Option<ShutdownHandle>>,
}

impl TestManager {
    pub(crate) fn new(name: &str, log: EventLog) -> Arc<Self> {
        Self::failing(name, log, Failures::default())
    }

    pub(crate) fn failing(name: &str, log: EventLog, failures: Failures) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log,
            failures,
            handle: Mutex::new(None),
        })
    }

    /// Fire the trigger as the manager's own listener would.
    pub(crate) async fn trigger(&self) {
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle.begin_shutdown().await;
        }
    }

    pub(crate) fn handle(&self) -> Option<ShutdownHandle> {
        self.handle.lock().clone()
    }
}

#[async_trait::async_trait]
impl ShutdownManager for TestManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, handle: ShutdownHandle) -> Result<(), ShutdownError> {
        self.log.lock().push(format!("start:{}", self.name));
        if self.failures.start {
            return Err(ShutdownError::ManagerStart {
                manager: self.name.clone(),
                reason: "listener unavailable".to_string(),
            });
        }
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    async fn on_shutdown_begin(&self) -> Result<(), ShutdownError> {
        self.log.lock().push(format!("begin:{}", self.name));
        if self.failures.begin {
            return Err(ShutdownError::Hook {
                manager: self.name.clone(),
                reason: "begin failed".to_string(),
            });
        }
        Ok(())
    }

    async fn on_shutdown_end(&self) -> Result<(), ShutdownError> {
        self.log.lock().push(format!("end:{}", self.name));
        if self.failures.end {
            return Err(ShutdownError::Hook {
                manager: self.name.clone(),
                reason: "end failed".to_string(),
            });
        }
        Ok(())
    }
}
