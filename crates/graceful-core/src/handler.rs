//! Error handlers for failures raised during shutdown.

use tracing::error;

use crate::error::ShutdownError;

/// Sink for errors reported by callbacks and managers.
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, err: ShutdownError);
}

/// Adapter turning a closure into an [`ErrorHandler`].
pub struct ErrorFn<F> {
    f: F,
}

impl<F> ErrorFn<F>
where
    F: Fn(ShutdownError) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ErrorHandler for ErrorFn<F>
where
    F: Fn(ShutdownError) + Send + Sync,
{
    fn on_error(&self, err: ShutdownError) {
        (self.f)(err)
    }
}

/// Logs every reported error through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn on_error(&self, err: ShutdownError) {
        error!("Shutdown error: {}", err);
    }
}
