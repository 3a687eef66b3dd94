//! Playhost – a cooperative script host
//!
//! This crate bridges a suspend/resume capable interpreter to an asynchronous
//! host so that blocking-looking guest operations behave without freezing it:
//! - A reference interpreter that advances one instruction per tick and parks on suspensions
//! - A suspension scheduler that awaits timers and keystrokes on tokio and resumes exactly once
//! - A terminal surface with ordered output, an explicit line-capture state machine and ANSI rendering
//! - Host builtins (`sleep`, `choice`, `clear`, `input`, `time`, `random`) installed fresh per run
//! - Session state published on a watch channel, with structured cancellation

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Script host, builtins, scheduler and session state
pub mod host;
/// Reference cooperative interpreter
pub mod interpreter;
/// Terminal I/O surface
pub mod terminal;

// Re-export key types for convenience
pub use host::{CancelHandle, HostConfig, HostError, Outcome, ScriptHost, SessionState};
pub use terminal::{ColorTag, Key, TerminalHandle};

/// Current version of playhost
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
