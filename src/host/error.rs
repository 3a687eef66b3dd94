//! Error types for the script host

use thiserror::Error;
use uuid::Uuid;

use super::session::SessionState;
use crate::interpreter::{GuestError, GuestErrorKind, ScriptError};

/// Convenience result alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;

/// Everything that can stop a run or refuse one.
#[derive(Debug, Error)]
pub enum HostError {
    /// A session is still running or waiting for input.
    #[error("a script is already running (session {0})")]
    SessionBusy(Uuid),

    /// Illegal session state change
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// The interpreter asked for a virtual file the host does not provide.
    #[error("FileNotFoundError: File not found: '{0}'")]
    ResourceNotFound(String),

    /// Source failed to compile
    #[error("{0}")]
    Syntax(#[from] ScriptError),

    /// Uncaught guest exception
    #[error("{0}")]
    Guest(GuestError),

    /// The keystroke source closed or the surface dropped the pending request.
    #[error("InputUnavailable: no more input can be read")]
    InputUnavailable,

    /// The run was cancelled through its cancel handle.
    #[error("Cancelled: execution was cancelled")]
    Cancelled,

    /// The scheduler and the interpreter disagreed about a suspension.
    #[error("SchedulerError: {0}")]
    Scheduler(String),
}

impl From<GuestError> for HostError {
    fn from(err: GuestError) -> Self {
        match err.kind {
            GuestErrorKind::ResourceNotFound => HostError::ResourceNotFound(err.message),
            _ => HostError::Guest(err),
        }
    }
}

impl HostError {
    /// Whether the error ends a run (as opposed to refusing to start one).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HostError::SessionBusy(_) | HostError::InvalidTransition { .. }
        )
    }
}
