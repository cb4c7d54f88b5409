//! Shutdown callbacks.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;

use crate::error::ShutdownError;

/// A unit of cleanup work run once when shutdown begins.
///
/// The argument is the name of the manager that triggered the shutdown.
#[async_trait::async_trait]
pub trait ShutdownCallback: Send + Sync {
    async fn on_shutdown(&self, manager: &str) -> Result<(), ShutdownError>;
}

/// Adapter turning an async closure into a [`ShutdownCallback`].
///
/// ```rust,ignore
/// coordinator.add_callback(Arc::new(ShutdownFn::new(|manager| async move {
///     tracing::info!("flushing buffers ({manager})");
///     Ok(())
/// })));
/// ```
pub struct ShutdownFn<F> {
    f: F,
}

impl<F, Fut> ShutdownFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F, Fut> ShutdownCallback for ShutdownFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
{
    async fn on_shutdown(&self, manager: &str) -> Result<(), ShutdownError> {
        (self.f)(manager.to_string()).await
    }
}

/// Run one callback, converting a panic or an expired deadline into an error.
pub(crate) async fn run_callback(
    callback: &dyn ShutdownCallback,
    manager: &str,
    deadline: Option<Duration>,
) -> Result<(), ShutdownError> {
    let guarded = AssertUnwindSafe(callback.on_shutdown(manager)).catch_unwind();

    let outcome = match deadline {
        Some(after) => match tokio::time::timeout(after, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(ShutdownError::Timeout { after }),
        },
        None => guarded.await,
    };

    outcome.unwrap_or_else(|payload| Err(ShutdownError::Panicked(panic_message(payload.as_ref()))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
