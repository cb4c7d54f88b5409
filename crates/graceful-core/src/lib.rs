//! # Graceful Core
//!
//! Coordinates orderly process termination.
//!
//! ## Components
//!
//! - [`ShutdownManager`] - trigger sources (signals, admin commands) that start
//!   listening on [`GracefulShutdown::start`] and call back through a
//!   [`ShutdownHandle`] when shutdown should begin
//! - [`ShutdownCallback`] - cleanup work run once per shutdown
//! - [`ErrorHandler`] - sink for every error raised while shutting down
//! - [`GracefulShutdown`] - manager-triggered, callbacks run concurrently
//! - [`SequentialShutdown`] - cancellation-triggered, callbacks run in order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graceful_core::{GracefulShutdown, TracingErrorHandler};
//!
//! let gs = GracefulShutdown::new();
//! gs.add_manager(Arc::new(SignalManager::default()));
//! gs.add_callback_fn(|manager| async move {
//!     tracing::info!("closing connections ({manager})");
//!     Ok(())
//! });
//! gs.set_error_handler(Arc::new(TracingErrorHandler));
//! gs.start().await?;
//! ```

pub mod callback;
pub mod error;
pub mod graceful;
pub mod handler;
pub mod manager;
mod registry;
pub mod sequential;
pub mod state;

#[cfg(test)]
mod testing;

pub use callback::{ShutdownCallback, ShutdownFn};
pub use error::ShutdownError;
pub use graceful::GracefulShutdown;
pub use handler::{ErrorFn, ErrorHandler, TracingErrorHandler};
pub use manager::{ShutdownCoordinator, ShutdownHandle, ShutdownManager};
pub use sequential::SequentialShutdown;
pub use state::CoordinatorState;
