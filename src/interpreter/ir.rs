use super::ast::{BinaryOp, CompareOp, UnaryOp};
use super::value::Value;

/// Compiled program ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramIr {
    /// Program identifier.
    pub name: String,
    /// Flat instruction stream; jump targets are indices into it.
    pub code: Vec<Instruction>,
    /// Source line of each instruction (same length as `code`).
    pub lines: Vec<usize>,
}

impl ProgramIr {
    /// Source line for the instruction at `pc`.
    pub fn line_at(&self, pc: usize) -> Option<usize> {
        self.lines.get(pc).copied()
    }
}

/// Stack machine instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a literal.
    Const(Value),
    /// Push the value bound to a name.
    Load(String),
    /// Pop and bind to a name in the current namespace.
    Store(String),
    /// Pop a value and push one of its members.
    LoadAttr(String),
    /// Pop index and value, push `value[index]`.
    Index,
    /// Pop `n` values and push them as a list.
    BuildList(usize),
    /// Pop one operand, push the result.
    Unary(UnaryOp),
    /// Pop two operands, push the result.
    Binary(BinaryOp),
    /// Pop two operands, push the boolean result.
    Compare(CompareOp),
    /// Pop `n` arguments and the callee, push the result (or suspend).
    Call(usize),
    /// Discard the top of the stack.
    Pop,
    /// Unconditional jump.
    Jump(usize),
    /// Pop; jump when falsy.
    JumpIfFalse(usize),
    /// Jump keeping the top when falsy, otherwise pop it (`and`).
    JumpIfFalseOrPop(usize),
    /// Jump keeping the top when truthy, otherwise pop it (`or`).
    JumpIfTrueOrPop(usize),
    /// Bind a module by name, loading it first if needed.
    Import(String),
    /// Pop a sequence and start iterating over it.
    GetIter,
    /// Push the next item of the innermost iterator, or drop it and jump when exhausted.
    ForIter(usize),
    /// Drop the innermost iterator (`break` out of a `for`).
    PopIter,
}
