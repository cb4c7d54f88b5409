//! Configuration schema definitions.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub signal: SignalConfig,
}

/// Which shutdown sequencing a coordinator uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Triggered by a manager; callbacks run concurrently behind a barrier.
    #[default]
    ConcurrentBarrier,
    /// Triggered by cancellation; callbacks and hooks run one after another.
    SequentialOnCancel,
}

impl std::fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownMode::ConcurrentBarrier => write!(f, "concurrent_barrier"),
            ShutdownMode::SequentialOnCancel => write!(f, "sequential_on_cancel"),
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Name reported to callbacks when no manager triggered the shutdown.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub mode: ShutdownMode,

    /// When false, a second trigger re-runs the whole sequence.
    #[serde(default = "default_true")]
    pub guard_repeated_triggers: bool,

    /// Per-callback deadline. Unset means callbacks may run forever.
    #[serde(default)]
    pub callback_timeout_secs: Option<u64>,
}

fn default_name() -> String {
    "graceful".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            mode: ShutdownMode::default(),
            guard_repeated_triggers: true,
            callback_timeout_secs: None,
        }
    }
}

impl CoordinatorConfig {
    /// Get the callback timeout as a Duration.
    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }
}

/// Termination signals a signal manager can listen for.
///
/// Deserialized through [`FromStr`], so config files accept the same names
/// as the parser: `"terminate"`, `"term"`, `"SIGTERM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TerminationSignal {
    /// SIGINT (Ctrl+C).
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGHUP.
    Hangup,
    /// SIGQUIT.
    Quit,
    /// SIGUSR1.
    User1,
    /// SIGUSR2.
    User2,
}

impl TerminationSignal {
    /// Signals used when none are configured.
    pub fn defaults() -> Vec<TerminationSignal> {
        vec![TerminationSignal::Interrupt, TerminationSignal::Terminate]
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
            TerminationSignal::Hangup => write!(f, "SIGHUP"),
            TerminationSignal::Quit => write!(f, "SIGQUIT"),
            TerminationSignal::User1 => write!(f, "SIGUSR1"),
            TerminationSignal::User2 => write!(f, "SIGUSR2"),
        }
    }
}

impl FromStr for TerminationSignal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" | "INTERRUPT" => Ok(TerminationSignal::Interrupt),
            "TERM" | "TERMINATE" => Ok(TerminationSignal::Terminate),
            "HUP" | "HANGUP" => Ok(TerminationSignal::Hangup),
            "QUIT" => Ok(TerminationSignal::Quit),
            "USR1" | "USER1" => Ok(TerminationSignal::User1),
            "USR2" | "USER2" => Ok(TerminationSignal::User2),
            _ => Err(ConfigError::UnknownSignal(s.to_string())),
        }
    }
}

impl TryFrom<String> for TerminationSignal {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Signal manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "TerminationSignal::defaults")]
    pub signals: Vec<TerminationSignal>,

    /// Exit code used once the shutdown sequence has finished.
    #[serde(default)]
    pub exit_code: i32,

    /// Whether the manager exits the process when shutdown ends.
    /// Set to false when embedding or testing.
    #[serde(default = "default_true")]
    pub exit_on_finish: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            signals: TerminationSignal::defaults(),
            exit_code: 0,
            exit_on_finish: true,
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
