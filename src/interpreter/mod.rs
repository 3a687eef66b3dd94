//! Reference cooperative interpreter for the guest scripting language.
//!
//! Guest source is parsed into an AST, lowered into a flat instruction IR, and
//! executed by [`InterpreterRuntime`], which advances one instruction per
//! [`InterpreterRuntime::tick`]. Anything that would block (timers, line input)
//! is expressed as a [`Suspension`] handed back to the caller, who resumes the
//! runtime once the awaited event has happened. The runtime never touches the
//! terminal or the event loop directly; every effect goes through the
//! [`InterpreterHost`] trait.

/// Abstract syntax tree definitions for the guest language.
pub mod ast;
/// Lowering of parsed programs into the IR.
pub mod builder;
/// Instruction-level intermediate representation.
pub mod ir;
/// Tokenizer and parser.
pub mod parser;
/// Ticking runtime and the host contract.
pub mod runtime;
/// Guest values and operator semantics.
pub mod value;

pub use ast::{Expr, Program, Statement, Stmt};
pub use builder::build_ir;
pub use ir::{Instruction, ProgramIr};
pub use parser::parse_program;
pub use runtime::{
    BuiltinKind, BuiltinOutcome, InterpreterHost, InterpreterRuntime, RuntimeError, RuntimeEvent,
    SuspendReason, Suspension, library_path,
};
pub use value::{Callable, ModuleRef, NativeFn, Value};

use std::fmt;
use thiserror::Error;

/// Convenience result alias for compilation.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors raised while turning source text into a runnable program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Parsing failed due to invalid syntax.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// Structural validation failed (`break` outside a loop, etc.).
    #[error("SyntaxError: {0}")]
    Validation(String),
}

/// Compile guest source into IR in one step.
pub fn compile(name: &str, source: &str) -> Result<ProgramIr> {
    let program = parse_program(name, source)?;
    build_ir(&program)
}

/// Category of a guest exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestErrorKind {
    /// Unknown variable.
    NameError,
    /// Wrong operand or argument type.
    TypeError,
    /// Right type, bad value.
    ValueError,
    /// Sequence index out of range, or choice from an empty sequence.
    IndexError,
    /// Division or modulo by zero.
    ZeroDivisionError,
    /// Integer arithmetic overflow.
    OverflowError,
    /// Member lookup on a module or value failed.
    AttributeError,
    /// A library module failed to compile.
    SyntaxError,
    /// A virtual file requested through the host's `read` hook does not exist.
    ResourceNotFound,
    /// Internal interpreter invariant violated.
    SystemError,
}

impl GuestErrorKind {
    /// Guest-visible exception name.
    pub fn name(self) -> &'static str {
        match self {
            GuestErrorKind::NameError => "NameError",
            GuestErrorKind::TypeError => "TypeError",
            GuestErrorKind::ValueError => "ValueError",
            GuestErrorKind::IndexError => "IndexError",
            GuestErrorKind::ZeroDivisionError => "ZeroDivisionError",
            GuestErrorKind::OverflowError => "OverflowError",
            GuestErrorKind::AttributeError => "AttributeError",
            GuestErrorKind::SyntaxError => "SyntaxError",
            GuestErrorKind::ResourceNotFound => "FileNotFoundError",
            GuestErrorKind::SystemError => "SystemError",
        }
    }
}

/// Exception raised by guest code (or by a host builtin on its behalf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestError {
    /// Exception category.
    pub kind: GuestErrorKind,
    /// Human-readable message. For [`GuestErrorKind::ResourceNotFound`] this is the resource path.
    pub message: String,
    /// Source line the exception was raised on, when known.
    pub line: Option<usize>,
}

impl GuestError {
    /// Create an exception without location information.
    pub fn new(kind: GuestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    /// Exception raised when a virtual file is missing.
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Self::new(GuestErrorKind::ResourceNotFound, resource)
    }

    /// Attach a line number unless one is already present.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GuestErrorKind::ResourceNotFound => {
                write!(f, "{}: File not found: '{}'", self.kind.name(), self.message)?
            }
            kind => write!(f, "{}: {}", kind.name(), self.message)?,
        }
        if let Some(line) = self.line {
            write!(f, " on line {}", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for GuestError {}
