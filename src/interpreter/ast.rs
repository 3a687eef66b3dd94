use serde::{Deserialize, Serialize};

/// Expression nodes of the guest language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Expr {
    /// `None` literal.
    None,
    /// `True` / `False`.
    Boolean(bool),
    /// Signed integer literal.
    Integer(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Bare identifier.
    Name(String),
    /// `[a, b, c]`.
    List(Vec<Expr>),
    /// `value.name`, used for module members.
    Attribute {
        /// Expression the attribute is read from.
        value: Box<Expr>,
        /// Attribute name.
        name: String,
    },
    /// `value[index]`.
    Index {
        /// Indexed expression.
        value: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `callee(args...)`.
    Call {
        /// Expression evaluating to a callable.
        callee: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
    },
    /// Prefix operator application.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Arithmetic operator application.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Comparison operator application.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Short-circuiting `and`.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuiting `or`.
    Or(Box<Expr>, Box<Expr>),
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `+x`
    Plus,
    /// `not x`
    Not,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Expression evaluated for its side effects.
    Expr(Expr),
    /// `name = value`
    Assign {
        /// Variable being bound.
        target: String,
        /// Bound value.
        value: Expr,
    },
    /// `import name`
    Import(String),
    /// `if`/`elif`/`else` chain.
    If {
        /// Conditions and bodies in source order (`if` first, then each `elif`).
        branches: Vec<(Expr, Vec<Statement>)>,
        /// `else` body.
        otherwise: Option<Vec<Statement>>,
    },
    /// `while condition:`
    While {
        /// Loop condition.
        condition: Expr,
        /// Loop body.
        body: Vec<Statement>,
    },
    /// `for target in iterable:`
    For {
        /// Loop variable.
        target: String,
        /// Sequence iterated over.
        iterable: Expr,
        /// Loop body.
        body: Vec<Statement>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `pass`
    Pass,
}

/// A statement tagged with the source line it starts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// 1-based source line.
    pub line: usize,
    /// The statement itself.
    pub kind: Stmt,
}

impl Statement {
    /// Tag a statement with its line.
    pub fn new(line: usize, kind: Stmt) -> Self {
        Self { line, kind }
    }
}

/// Parsed guest program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Program identifier (`<stdin>` for the main script, the module name for libraries).
    pub name: String,
    /// Top-level statements.
    pub body: Vec<Statement>,
    /// Source text, retained for error reporting and debugging.
    pub source: String,
}

impl Program {
    /// Construct a new program with the provided name/source.
    pub fn new(name: impl Into<String>, source: impl Into<String>, body: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            body,
        }
    }
}
