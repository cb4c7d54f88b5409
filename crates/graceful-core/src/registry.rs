//! Ordered registries of managers, callbacks and the error handler.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::callback::ShutdownCallback;
use crate::error::ShutdownError;
use crate::handler::ErrorHandler;
use crate::manager::ShutdownManager;

/// Insertion-ordered storage shared by both coordinator variants.
///
/// No deduplication and no capacity limit. Readers take a snapshot so an
/// in-flight shutdown never observes later registrations.
#[derive(Default)]
pub(crate) struct Registry {
    managers: RwLock<Vec<Arc<dyn ShutdownManager>>>,
    callbacks: RwLock<Vec<Arc<dyn ShutdownCallback>>>,
    error_handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
}

impl Registry {
    pub(crate) fn add_manager(&self, manager: Arc<dyn ShutdownManager>) {
        debug!("Registered shutdown manager: {}", manager.name());
        self.managers.write().push(manager);
    }

    pub(crate) fn add_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        self.callbacks.write().push(callback);
    }

    pub(crate) fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.error_handler.write() = Some(handler);
    }

    pub(crate) fn managers(&self) -> Vec<Arc<dyn ShutdownManager>> {
        self.managers.read().clone()
    }

    pub(crate) fn callbacks(&self) -> Vec<Arc<dyn ShutdownCallback>> {
        self.callbacks.read().clone()
    }

    pub(crate) fn manager_count(&self) -> usize {
        self.managers.read().len()
    }

    pub(crate) fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Forward `err` to the handler; dropped when no handler is set.
    pub(crate) fn report_error(&self, err: ShutdownError) {
        let handler = self.error_handler.read().clone();
        match handler {
            Some(handler) => handler.on_error(err),
            None => debug!("No error handler set, dropping: {}", err),
        }
    }
}
