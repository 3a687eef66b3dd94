use std::cmp::Ordering;
use std::fmt;

use super::ast::{BinaryOp, CompareOp, UnaryOp};
use super::{GuestError, GuestErrorKind};

/// Largest list or string (in bytes) that a single operation may build.
pub(crate) const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// Runtime value manipulated by guest programs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `None`.
    None,
    /// Boolean.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// List of values.
    List(Vec<Value>),
    /// Something that can be called.
    Function(Callable),
    /// An imported module.
    Module(ModuleRef),
}

/// Callable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callable {
    /// Function implemented by the interpreter itself.
    Native(NativeFn),
    /// Function provided by the host, addressed by its registry name.
    Host(String),
}

/// Interpreter-native functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFn {
    /// `print(*args)`
    Print,
    /// `len(x)`
    Len,
    /// `str(x)`
    Str,
    /// `int(x)`
    Int,
    /// `float(x)`
    Float,
    /// `range(...)`
    Range,
}

impl NativeFn {
    /// Look up a native function by its guest-visible name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "print" => Some(NativeFn::Print),
            "len" => Some(NativeFn::Len),
            "str" => Some(NativeFn::Str),
            "int" => Some(NativeFn::Int),
            "float" => Some(NativeFn::Float),
            "range" => Some(NativeFn::Range),
            _ => None,
        }
    }

    /// Guest-visible name.
    pub fn name(self) -> &'static str {
        match self {
            NativeFn::Print => "print",
            NativeFn::Len => "len",
            NativeFn::Str => "str",
            NativeFn::Int => "int",
            NativeFn::Float => "float",
            NativeFn::Range => "range",
        }
    }
}

/// Module handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// Module whose members live in the host's builtin registry (`time`, `random`).
    Host(String),
    /// Module loaded from the virtual library, with its own namespace.
    Library {
        /// Module name.
        name: String,
        /// Index of the module's namespace inside the interpreter.
        namespace: usize,
    },
}

impl Value {
    /// Guest-visible type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Module(_) => "module",
        }
    }

    /// Truthiness, as used by `if`, `while`, `and`, `or`, `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(flag) => *flag,
            Value::Integer(num) => *num != 0,
            Value::Float(num) => *num != 0.0,
            Value::String(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Function(_) | Value::Module(_) => true,
        }
    }

    /// Numeric view, treating booleans as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(num) => Some(*num as f64),
            Value::Float(num) => Some(*num),
            Value::Boolean(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(num) => Some(*num),
            Value::Boolean(flag) => Some(*flag as i64),
            _ => None,
        }
    }

    /// Representation used inside containers (`['a', 1]`).
    pub fn repr(&self) -> String {
        match self {
            Value::String(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    /// Items of a sequence value, for iteration and `choice`.
    pub fn sequence_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items.clone()),
            Value::String(text) => Some(text.chars().map(|ch| Value::String(ch.to_string())).collect()),
            _ => None,
        }
    }

    /// `value[index]`
    pub fn index(&self, index: &Value) -> Result<Value, GuestError> {
        let position = index.as_integer().ok_or_else(|| {
            GuestError::new(
                GuestErrorKind::TypeError,
                format!("indices must be integers, not {}", index.type_name()),
            )
        })?;
        match self {
            Value::List(items) => resolve_index(position, items.len())
                .map(|idx| items[idx].clone())
                .ok_or_else(|| GuestError::new(GuestErrorKind::IndexError, "list index out of range")),
            Value::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                resolve_index(position, chars.len())
                    .map(|idx| Value::String(chars[idx].to_string()))
                    .ok_or_else(|| {
                        GuestError::new(GuestErrorKind::IndexError, "string index out of range")
                    })
            }
            other => Err(GuestError::new(
                GuestErrorKind::TypeError,
                format!("'{}' object is not subscriptable", other.type_name()),
            )),
        }
    }

    /// Apply a prefix operator.
    pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, GuestError> {
        match (op, operand) {
            (UnaryOp::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
            (UnaryOp::Negate, Value::Integer(num)) => num
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(overflow),
            (UnaryOp::Negate, Value::Float(num)) => Ok(Value::Float(-num)),
            (UnaryOp::Negate, Value::Boolean(flag)) => Ok(Value::Integer(-(*flag as i64))),
            (UnaryOp::Plus, Value::Integer(_) | Value::Float(_)) => Ok(operand.clone()),
            (UnaryOp::Plus, Value::Boolean(flag)) => Ok(Value::Integer(*flag as i64)),
            (op, value) => Err(GuestError::new(
                GuestErrorKind::TypeError,
                format!(
                    "bad operand type for unary {}: '{}'",
                    if op == UnaryOp::Negate { "-" } else { "+" },
                    value.type_name()
                ),
            )),
        }
    }

    /// Apply an arithmetic operator.
    pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, GuestError> {
        match (op, left, right) {
            (BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                let mut items = a.clone();
                items.extend(b.iter().cloned());
                Ok(Value::List(items))
            }
            (BinaryOp::Mul, Value::String(text), count) | (BinaryOp::Mul, count, Value::String(text))
                if count.as_integer().is_some() =>
            {
                let count = repeat_count(text.len(), count, "string")?;
                Ok(Value::String(text.repeat(count)))
            }
            (BinaryOp::Mul, Value::List(items), count) | (BinaryOp::Mul, count, Value::List(items))
                if count.as_integer().is_some() =>
            {
                let count = repeat_count(items.len(), count, "list")?;
                let mut repeated = Vec::with_capacity(items.len() * count);
                for _ in 0..count {
                    repeated.extend(items.iter().cloned());
                }
                Ok(Value::List(repeated))
            }
            _ => {
                if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
                    integer_op(op, a, b)
                } else if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
                    float_op(op, a, b)
                } else {
                    Err(GuestError::new(
                        GuestErrorKind::TypeError,
                        format!(
                            "unsupported operand type(s) for {}: '{}' and '{}'",
                            binary_symbol(op),
                            left.type_name(),
                            right.type_name()
                        ),
                    ))
                }
            }
        }
    }

    /// Apply a comparison operator.
    pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, GuestError> {
        let result = match op {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Ne => !left.loose_eq(right),
            _ => {
                let ordering = left.partial_order(right).ok_or_else(|| {
                    GuestError::new(
                        GuestErrorKind::TypeError,
                        format!(
                            "'{}' not supported between instances of '{}' and '{}'",
                            compare_symbol(op),
                            left.type_name(),
                            right.type_name()
                        ),
                    )
                })?;
                match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        };
        Ok(Value::Boolean(result))
    }

    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::String(a), Value::String(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self == other,
            },
        }
    }

    fn partial_order(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => {
                if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
                    return Some(a.cmp(&b));
                }
                let (a, b) = (self.as_number()?, other.as_number()?);
                a.partial_cmp(&b)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Integer(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{}", format_float(*num)),
            Value::String(text) => write!(f, "{}", text),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Function(Callable::Native(native)) => {
                write!(f, "<built-in function {}>", native.name())
            }
            Value::Function(Callable::Host(name)) => write!(f, "<built-in function {}>", name),
            Value::Module(ModuleRef::Host(name)) | Value::Module(ModuleRef::Library { name, .. }) => {
                write!(f, "<module '{}'>", name)
            }
        }
    }
}

/// Python-style float formatting: integral values keep a trailing `.0`.
pub fn format_float(num: f64) -> String {
    if num.is_nan() {
        "nan".to_string()
    } else if num.is_infinite() {
        if num > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if num.fract() == 0.0 && num.abs() < 1e16 {
        format!("{:.1}", num)
    } else {
        format!("{}", num)
    }
}

fn resolve_index(position: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if position < 0 { position + len } else { position };
    if (0..len).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}

fn overflow() -> GuestError {
    GuestError::new(GuestErrorKind::OverflowError, "integer result too large")
}

fn zero_division(message: &str) -> GuestError {
    GuestError::new(GuestErrorKind::ZeroDivisionError, message)
}

fn integer_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, GuestError> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let rem = a.checked_rem(b).ok_or_else(overflow)?;
            if rem != 0 && ((rem < 0) != (b < 0)) {
                rem + b
            } else {
                rem
            }
        }
    };
    Ok(Value::Integer(value))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, GuestError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo"));
            }
            a - b * (a / b).floor()
        }
    };
    Ok(Value::Float(value))
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
    }
}

fn compare_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::Ne => "!=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

// Repeating an empty sequence yields an empty one whatever the count.
fn repeat_count(len: usize, count: &Value, what: &str) -> Result<usize, GuestError> {
    if len == 0 {
        return Ok(0);
    }
    let count = usize::try_from(count.as_integer().unwrap_or(0).max(0)).unwrap_or(usize::MAX);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(count),
        _ => Err(GuestError::new(
            GuestErrorKind::OverflowError,
            format!("repeated {} is too long", what),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_and_modulo_follow_floor_semantics() {
        assert_eq!(
            Value::binary(BinaryOp::FloorDiv, &Value::Integer(-7), &Value::Integer(2)).unwrap(),
            Value::Integer(-4)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mod, &Value::Integer(-7), &Value::Integer(2)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            Value::binary(BinaryOp::Mod, &Value::Integer(7), &Value::Integer(-2)).unwrap(),
            Value::Integer(-1)
        );
        assert_eq!(
            Value::binary(BinaryOp::FloorDiv, &Value::Integer(7), &Value::Integer(-2)).unwrap(),
            Value::Integer(-4)
        );
    }

    #[test]
    fn true_division_always_produces_float() {
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Integer(3), &Value::Integer(2)).unwrap(),
            Value::Float(1.5)
        );
        let err = Value::binary(BinaryOp::Div, &Value::Integer(1), &Value::Integer(0)).unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::ZeroDivisionError);
    }

    #[test]
    fn display_matches_guest_conventions() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        let list = Value::List(vec![Value::String("a".into()), Value::Integer(1), Value::None]);
        assert_eq!(list.to_string(), "['a', 1, None]");
        assert_eq!(Value::Boolean(true).to_string(), "True");
    }

    #[test]
    fn string_concatenation_and_repetition() {
        let joined =
            Value::binary(BinaryOp::Add, &Value::String("ab".into()), &Value::String("c".into()))
                .unwrap();
        assert_eq!(joined, Value::String("abc".into()));
        let repeated =
            Value::binary(BinaryOp::Mul, &Value::String("-".into()), &Value::Integer(3)).unwrap();
        assert_eq!(repeated, Value::String("---".into()));
        let err = Value::binary(BinaryOp::Add, &Value::String("a".into()), &Value::Integer(1))
            .unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::TypeError);
    }

    #[test]
    fn oversized_repetition_is_an_overflow_error() {
        let huge = Value::Integer(i64::MAX);
        let err = Value::binary(BinaryOp::Mul, &Value::String("ab".into()), &huge).unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::OverflowError);
        let pair = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let err = Value::binary(BinaryOp::Mul, &huge, &pair).unwrap_err();
        assert_eq!(err.kind, GuestErrorKind::OverflowError);
        let over_cap = Value::Integer(MAX_SEQUENCE_LEN as i64 + 1);
        let err = Value::binary(BinaryOp::Mul, &Value::String("x".into()), &over_cap).unwrap_err();
        assert_eq!(err.message, "repeated string is too long");

        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::List(Vec::new()), &huge).unwrap(),
            Value::List(Vec::new())
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &pair, &Value::Integer(-3)).unwrap(),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn negative_indices_wrap_once() {
        let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(list.index(&Value::Integer(-1)).unwrap(), Value::Integer(2));
        assert_eq!(
            list.index(&Value::Integer(2)).unwrap_err().kind,
            GuestErrorKind::IndexError
        );
    }

    #[test]
    fn mixed_numeric_comparison() {
        assert_eq!(
            Value::compare(CompareOp::Eq, &Value::Integer(1), &Value::Float(1.0)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::compare(CompareOp::Lt, &Value::String("a".into()), &Value::String("b".into()))
                .unwrap(),
            Value::Boolean(true)
        );
        assert!(Value::compare(CompareOp::Lt, &Value::Integer(1), &Value::String("b".into())).is_err());
    }
}
