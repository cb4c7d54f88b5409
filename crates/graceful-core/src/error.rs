//! Shutdown errors.

use std::time::Duration;

use thiserror::Error;

use crate::state::CoordinatorState;

/// Errors produced by managers, callbacks and the coordinator itself.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// A manager failed to begin listening for its trigger.
    #[error("Failed to start shutdown manager {manager}: {reason}")]
    ManagerStart { manager: String, reason: String },

    /// A shutdown callback failed.
    #[error("Shutdown callback failed: {0}")]
    Callback(String),

    /// A manager's pre/post shutdown hook failed.
    #[error("Shutdown hook of {manager} failed: {reason}")]
    Hook { manager: String, reason: String },

    /// A callback exceeded the configured deadline.
    #[error("Shutdown callback timed out after {after:?}")]
    Timeout { after: Duration },

    /// A callback panicked.
    #[error("Shutdown callback panicked: {0}")]
    Panicked(String),

    /// Failed to install OS signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Operation not allowed in the coordinator's current state.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: CoordinatorState,
        to: CoordinatorState,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic shutdown error.
    #[error("{0}")]
    Custom(String),
}

impl ShutdownError {
    /// Shorthand for [`ShutdownError::Callback`].
    pub fn callback(reason: impl Into<String>) -> Self {
        ShutdownError::Callback(reason.into())
    }

    /// Shorthand for [`ShutdownError::Custom`].
    pub fn custom(reason: impl Into<String>) -> Self {
        ShutdownError::Custom(reason.into())
    }
}
