//! Suspension scheduler
//!
//! Drives an [`InterpreterRuntime`] on the tokio event loop. Progress ticks run
//! back to back until the time slice is used up, at which point the scheduler
//! yields to other tasks. Suspensions park the interpreter until the awaited
//! timer or line of input arrives, and the result is handed back through the
//! suspension's ticket so each one is resumed exactly once.

use std::pin::pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::cancel::CancelToken;
use super::error::{HostError, Result};
use super::session::{SessionState, SessionTracker};
use crate::interpreter::{
    InterpreterHost, InterpreterRuntime, RuntimeError, RuntimeEvent, SuspendReason, Value,
};
use crate::terminal::{Key, TerminalHandle};

/// What the scheduler is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkReason {
    /// A `sleep` timer.
    Timer,
    /// A line of input.
    Input,
}

/// Scheduler state for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Ticking the interpreter.
    Executing,
    /// Waiting for an external event.
    Parked(ParkReason),
    /// The run is over.
    Finished,
}

/// Per-run driver tying the interpreter to timers, keystrokes and cancellation.
pub struct SuspensionScheduler<'a> {
    yield_limit: Duration,
    cancel: CancelToken,
    keys: &'a mut mpsc::Receiver<Key>,
    terminal: &'a TerminalHandle,
    session: &'a mut SessionTracker,
    state: SchedulerState,
    yields: u64,
}

impl<'a> SuspensionScheduler<'a> {
    /// Create a scheduler for one run.
    pub fn new(
        yield_limit: Duration,
        cancel: CancelToken,
        keys: &'a mut mpsc::Receiver<Key>,
        terminal: &'a TerminalHandle,
        session: &'a mut SessionTracker,
    ) -> Self {
        Self {
            yield_limit,
            cancel,
            keys,
            terminal,
            session,
            state: SchedulerState::Executing,
            yields: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of time-slice yields so far.
    pub fn yields(&self) -> u64 {
        self.yields
    }

    /// Run the interpreter until it completes, fails, or is cancelled.
    pub async fn drive<H: InterpreterHost>(&mut self, runtime: &mut InterpreterRuntime<H>) -> Result<()> {
        let result = self.drive_inner(runtime).await;
        self.set_state(SchedulerState::Finished);
        result
    }

    async fn drive_inner<H: InterpreterHost>(&mut self, runtime: &mut InterpreterRuntime<H>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }
        let mut slice_start = Instant::now();
        loop {
            match runtime.tick() {
                Ok(RuntimeEvent::Progress) => {
                    if slice_start.elapsed() >= self.yield_limit {
                        self.yields += 1;
                        tokio::task::yield_now().await;
                        if self.cancel.is_cancelled() {
                            return Err(HostError::Cancelled);
                        }
                        slice_start = Instant::now();
                    }
                }
                Ok(RuntimeEvent::Suspended(suspension)) => {
                    debug!(ticket = suspension.ticket, reason = ?suspension.reason, "interpreter suspended");
                    let value = match suspension.reason {
                        SuspendReason::Timer(delay) => self.park_timer(delay).await?,
                        SuspendReason::Input { prompt } => self.park_input(&prompt).await?,
                    };
                    runtime
                        .resume(suspension.ticket, value)
                        .map_err(|err| HostError::Scheduler(err.to_string()))?;
                    self.set_state(SchedulerState::Executing);
                    slice_start = Instant::now();
                }
                Ok(RuntimeEvent::Completed) => {
                    debug!(steps = runtime.steps(), yields = self.yields, "interpreter completed");
                    return Ok(());
                }
                Err(RuntimeError::Guest(err)) => return Err(err.into()),
                Err(err) => return Err(HostError::Scheduler(err.to_string())),
            }
        }
    }

    async fn park_timer(&mut self, delay: Duration) -> Result<Value> {
        self.set_state(SchedulerState::Parked(ParkReason::Timer));
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::warn!("cancelled during sleep; timer dropped");
                Err(HostError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(Value::None),
        }
    }

    async fn park_input(&mut self, prompt: &str) -> Result<Value> {
        self.set_state(SchedulerState::Parked(ParkReason::Input));
        self.session.transition(SessionState::AwaitingInput)?;

        let request = self
            .terminal
            .request_line(prompt)
            .map_err(|err| HostError::Scheduler(err.to_string()))?;
        let mut line = pin!(request.line());

        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.terminal.abort_input();
                    tracing::warn!("cancelled while awaiting input; request rejected");
                    break Err(HostError::Cancelled);
                }
                resolved = &mut line => {
                    break resolved.map_err(|_| HostError::InputUnavailable);
                }
                key = self.keys.recv() => match key {
                    Some(key) => {
                        self.terminal.handle_key(key);
                    }
                    None => {
                        self.terminal.abort_input();
                        tracing::warn!("keystroke source closed while awaiting input");
                        break Err(HostError::InputUnavailable);
                    }
                },
            }
        };

        let text = result?;
        self.session.transition(SessionState::Running)?;
        Ok(Value::String(text))
    }

    fn set_state(&mut self, next: SchedulerState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "scheduler state");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::cancel::CancelHandle;
    use crate::interpreter::{BuiltinKind, BuiltinOutcome, GuestError, compile};
    use crate::terminal::MemorySink;

    struct TimerHost {
        log: Vec<String>,
    }

    impl InterpreterHost for TimerHost {
        fn output(&mut self, text: &str) {
            self.log.push(text.to_string());
        }

        fn read(&mut self, resource: &str) -> std::result::Result<String, GuestError> {
            Err(GuestError::resource_not_found(resource))
        }

        fn builtin_kind(&self, name: &str) -> Option<BuiltinKind> {
            (name == "sleep").then_some(BuiltinKind::Suspending)
        }

        fn has_module(&self, _name: &str) -> bool {
            false
        }

        fn call_builtin(
            &mut self,
            _name: &str,
            args: Vec<Value>,
        ) -> std::result::Result<BuiltinOutcome, GuestError> {
            let secs = args.first().and_then(Value::as_number).unwrap_or(0.0);
            Ok(BuiltinOutcome::Suspend(SuspendReason::Timer(Duration::from_secs_f64(secs))))
        }
    }

    fn runtime(src: &str) -> InterpreterRuntime<TimerHost> {
        InterpreterRuntime::new(TimerHost { log: Vec::new() }, compile("<stdin>", src).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn timers_park_for_the_requested_delay() {
        let (_tx, mut keys) = mpsc::channel(4);
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut session = SessionTracker::new();
        session.start("").unwrap();
        let cancel = CancelHandle::new();

        let mut rt = runtime("print('a')\nsleep(2)\nprint('b')\n");
        let started = Instant::now();
        let mut scheduler =
            SuspensionScheduler::new(Duration::from_millis(100), cancel.token(), &mut keys, &terminal, &mut session);
        scheduler.drive(&mut rt).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Finished);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(rt.host().log, vec!["a\n", "b\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_a_live_timer() {
        let (_tx, mut keys) = mpsc::channel(4);
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut session = SessionTracker::new();
        session.start("").unwrap();
        let cancel = CancelHandle::new();

        let remote = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            remote.cancel();
        });

        let mut rt = runtime("sleep(60)\nprint('never')\n");
        let started = Instant::now();
        let mut scheduler =
            SuspensionScheduler::new(Duration::from_millis(100), cancel.token(), &mut keys, &terminal, &mut session);
        let err = scheduler.drive(&mut rt).await.unwrap_err();
        assert!(matches!(err, HostError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(rt.host().log.is_empty());
    }

    #[tokio::test]
    async fn zero_yield_limit_still_finishes_busy_loops() {
        let (_tx, mut keys) = mpsc::channel(4);
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut session = SessionTracker::new();
        session.start("").unwrap();
        let cancel = CancelHandle::new();

        let mut rt = runtime("n = 0\nwhile n < 200:\n    n += 1\nprint(n)\n");
        let mut scheduler =
            SuspensionScheduler::new(Duration::ZERO, cancel.token(), &mut keys, &terminal, &mut session);
        scheduler.drive(&mut rt).await.unwrap();
        assert!(scheduler.yields() > 0);
        assert_eq!(rt.host().log, vec!["200\n"]);
    }

    #[tokio::test]
    async fn cancel_before_start_runs_nothing() {
        let (_tx, mut keys) = mpsc::channel(4);
        let terminal = TerminalHandle::new(MemorySink::new());
        let mut session = SessionTracker::new();
        session.start("").unwrap();
        let cancel = CancelHandle::new();
        cancel.cancel();

        let mut rt = runtime("print('x')\n");
        let mut scheduler =
            SuspensionScheduler::new(Duration::from_millis(100), cancel.token(), &mut keys, &terminal, &mut session);
        assert!(matches!(scheduler.drive(&mut rt).await, Err(HostError::Cancelled)));
        assert!(rt.host().log.is_empty());
    }
}
