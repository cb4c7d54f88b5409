//! Coordinator state.

/// Lifecycle state of a shutdown coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoordinatorState {
    /// Registering managers and callbacks.
    Created = 0,
    /// Managers started and listening.
    Running = 1,
    /// Shutdown sequence in progress.
    ShuttingDown = 2,
    /// Shutdown sequence finished.
    Completed = 3,
}

impl CoordinatorState {
    /// Whether a shutdown episode has begun (or finished).
    pub fn is_shutdown(self) -> bool {
        matches!(
            self,
            CoordinatorState::ShuttingDown | CoordinatorState::Completed
        )
    }
}

impl From<u8> for CoordinatorState {
    fn from(v: u8) -> Self {
        match v {
            0 => CoordinatorState::Created,
            1 => CoordinatorState::Running,
            2 => CoordinatorState::ShuttingDown,
            3 => CoordinatorState::Completed,
            _ => CoordinatorState::Created,
        }
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Created => write!(f, "created"),
            CoordinatorState::Running => write!(f, "running"),
            CoordinatorState::ShuttingDown => write!(f, "shutting_down"),
            CoordinatorState::Completed => write!(f, "completed"),
        }
    }
}
