//! # Graceful Signal
//!
//! A [`ShutdownManager`](graceful_core::ShutdownManager) that triggers
//! shutdown when the process receives a termination signal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graceful_core::GracefulShutdown;
//! use graceful_signal::SignalManager;
//!
//! let gs = GracefulShutdown::new();
//! gs.add_manager(Arc::new(SignalManager::default()));
//! gs.start().await?;
//! ```

pub mod signal;

pub use graceful_config::TerminationSignal;
pub use signal::{send_signal, SignalEvent, SignalManager, SIGNAL_MANAGER_NAME};
