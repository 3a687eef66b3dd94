//! Execution session lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::error::{HostError, Result};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing has run yet.
    Idle,
    /// The interpreter is executing.
    Running,
    /// Parked on `input`.
    AwaitingInput,
    /// Finished normally.
    Completed,
    /// Finished with a fatal error.
    Errored,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, AwaitingInput)
                | (AwaitingInput, Running)
                | (Running, Completed)
                | (Running, Errored)
                | (AwaitingInput, Errored)
                | (Completed, Running)
                | (Errored, Running)
        )
    }

    /// Running or waiting for input.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::AwaitingInput)
    }

    /// Completed or errored.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Errored)
    }
}

/// One run from request to terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSession {
    /// Session id
    pub id: Uuid,
    state: SessionState,
    /// Script being executed
    pub source: String,
    /// When the run was requested
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionSession {
    /// New idle session for `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            source: source.into(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HostError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Owns the active session and publishes its state.
#[derive(Debug)]
pub struct SessionTracker {
    current: Option<ExecutionSession>,
    tx: watch::Sender<SessionState>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    /// Tracker with no session, publishing `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { current: None, tx }
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// State of the current session, `Idle` when there is none.
    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map(ExecutionSession::state)
            .unwrap_or(SessionState::Idle)
    }

    /// Current session.
    pub fn current(&self) -> Option<&ExecutionSession> {
        self.current.as_ref()
    }

    /// Replace the previous session with a new running one.
    ///
    /// Refused with [`HostError::SessionBusy`] while a session is active.
    pub fn start(&mut self, source: &str) -> Result<Uuid> {
        if let Some(active) = self.current.as_ref().filter(|s| s.state().is_active()) {
            return Err(HostError::SessionBusy(active.id));
        }
        let mut session = ExecutionSession::new(source);
        session.transition(SessionState::Running)?;
        let id = session.id;
        self.current = Some(session);
        self.tx.send_replace(SessionState::Running);
        Ok(id)
    }

    /// Transition the current session and publish the new state.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        let session = self.current.as_mut().ok_or(HostError::InvalidTransition {
            from: SessionState::Idle,
            to: next,
        })?;
        session.transition(next)?;
        tracing::debug!(session = %session.id, state = ?next, "session state");
        self.tx.send_replace(next);
        Ok(())
    }

    /// Drop the session and publish `Idle`.
    pub fn discard(&mut self) -> Option<ExecutionSession> {
        let previous = self.current.take();
        self.tx.send_replace(SessionState::Idle);
        previous
    }
}
