//! Script host
//!
//! Orchestrates one execution at a time: clears the terminal, compiles the
//! source, installs a fresh builtin registry, drives the interpreter through
//! the suspension scheduler, and reports the outcome. Fatal conditions are
//! written to the terminal on the error channel before the session state is
//! published.

/// Interpreter-facing host hooks.
pub mod bridge;
/// Host builtin registry.
pub mod builtins;
/// Cancellation handle and token.
pub mod cancel;
/// Host configuration.
pub mod config;
/// Error types.
pub mod error;
/// Virtual library files.
pub mod library;
/// Suspension scheduler.
pub mod scheduler;
/// Session lifecycle.
pub mod session;

pub use bridge::GuestBridge;
pub use builtins::{BuiltinContext, BuiltinHandler, BuiltinRegistration, BuiltinRegistry};
pub use cancel::CancelHandle;
pub use config::HostConfig;
pub use error::{HostError, Result};
pub use library::VirtualLibrary;
pub use scheduler::{ParkReason, SchedulerState, SuspensionScheduler};
pub use session::{ExecutionSession, SessionState, SessionTracker};

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::interpreter::{InterpreterRuntime, compile};
use crate::terminal::{Key, TerminalHandle};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The script ran to completion.
    Success,
    /// The script stopped on a fatal condition; the message was shown on the error channel.
    Failure(String),
}

/// Runs scripts against a terminal, one session at a time.
pub struct ScriptHost {
    config: HostConfig,
    terminal: TerminalHandle,
    keys: mpsc::Receiver<Key>,
    library: Arc<VirtualLibrary>,
    sessions: SessionTracker,
    cancel: CancelHandle,
}

impl ScriptHost {
    /// Create a host. Library modules under `config.library_dir` are loaded now.
    pub fn new(
        config: HostConfig,
        terminal: TerminalHandle,
        keys: mpsc::Receiver<Key>,
    ) -> anyhow::Result<Self> {
        let mut library = VirtualLibrary::new();
        if let Some(dir) = &config.library_dir {
            let count = library.load_dir(dir)?;
            info!(dir = %dir.display(), modules = count, "library loaded");
        }

        Ok(Self {
            config,
            terminal,
            keys,
            library: Arc::new(library),
            sessions: SessionTracker::new(),
            cancel: CancelHandle::new(),
        })
    }

    /// Execute `source` to completion.
    ///
    /// Refused with [`HostError::SessionBusy`] if an earlier run was abandoned
    /// mid-flight and not torn down. Every other failure is reported as
    /// [`Outcome::Failure`].
    ///
    /// Keys queued before the first run are kept as type-ahead. Keys left over
    /// from a previous session are discarded.
    pub async fn run(&mut self, source: &str) -> Result<Outcome> {
        let rerun = self.sessions.current().is_some();
        let id = self.sessions.start(source)?;
        info!(session = %id, "run started");
        if rerun {
            self.discard_keys();
        }

        self.cancel.reset();
        self.terminal.clear();

        match self.execute(source).await {
            Ok(()) => {
                self.sessions.transition(SessionState::Completed)?;
                info!(session = %id, "run completed");
                Ok(Outcome::Success)
            }
            Err(err) => {
                let message = err.to_string();
                match &err {
                    HostError::Cancelled | HostError::InputUnavailable => {
                        warn!(session = %id, error = %message, "run stopped")
                    }
                    _ => info!(session = %id, error = %message, "run failed"),
                }
                self.terminal.write_error(&message);
                self.sessions.transition(SessionState::Errored)?;
                Ok(Outcome::Failure(message))
            }
        }
    }

    async fn execute(&mut self, source: &str) -> Result<()> {
        let program = compile("<stdin>", source)?;

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let bridge = GuestBridge::new(
            self.terminal.clone(),
            BuiltinRegistry::standard(),
            Arc::clone(&self.library),
            rng,
        );
        let mut runtime = InterpreterRuntime::new(bridge, program);

        let mut scheduler = SuspensionScheduler::new(
            self.config.yield_limit(),
            self.cancel.token(),
            &mut self.keys,
            &self.terminal,
            &mut self.sessions,
        );
        scheduler.drive(&mut runtime).await
    }

    /// Discard the session, reject any pending input request and drop queued keys.
    pub fn teardown(&mut self) {
        if self.terminal.abort_input() {
            warn!("pending input rejected by teardown");
        }
        self.discard_keys();
        if let Some(session) = self.sessions.discard() {
            info!(session = %session.id, "session discarded");
        }
    }

    fn discard_keys(&mut self) {
        let mut dropped = 0usize;
        while self.keys.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(keys = dropped, "stale keystrokes discarded");
        }
    }

    /// Handle that cancels the run in progress.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Watch the session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sessions.subscribe()
    }

    /// Current session, if any.
    pub fn session(&self) -> Option<&ExecutionSession> {
        self.sessions.current()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    /// Terminal the host writes to.
    pub fn terminal(&self) -> &TerminalHandle {
        &self.terminal
    }

    /// Active configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Library modules available to `import`.
    pub fn library_mut(&mut self) -> &mut VirtualLibrary {
        Arc::make_mut(&mut self.library)
    }
}
