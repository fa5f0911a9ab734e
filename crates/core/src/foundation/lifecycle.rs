use std::sync::{Arc, Mutex};

use crate::errors::{CoreError, CoreResult};

/// Application lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    /// Whether `next` may follow this state
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Initializing, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Initializing | Running | Stopping, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }
}

/// Tracks the state of one run
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    state: Arc<Mutex<LifecycleState>>,
}

impl LifecycleManager {
    /// Create a new lifecycle manager
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState::Created)),
        }
    }

    pub fn state(&self) -> CoreResult<LifecycleState> {
        self.state
            .lock()
            .map(|state| *state)
            .map_err(|_| CoreError::lock_error("lifecycle"))
    }

    /// Check if the lifecycle manager is running
    pub fn is_running(&self) -> bool {
        matches!(self.state(), Ok(LifecycleState::Running))
    }

    /// Move to `next`, rejecting transitions out of order
    pub fn transition(&self, next: LifecycleState) -> CoreResult<()> {
        let mut state = self.state.lock().map_err(|_| CoreError::lock_error("lifecycle"))?;
        if !state.can_transition_to(next) {
            return Err(CoreError::Lifecycle { from: *state, to: next });
        }
        tracing::debug!(target: "kindred::lifecycle", "{:?} -> {:?}", *state, next);
        *state = next;
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
