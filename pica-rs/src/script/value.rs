//! Runtime value type for the scripting language.
//!
//! Values are plain data: assigning a list or record copies it, so mutating
//! one binding never shows through another.  Functions are the only shared
//! payload and they are immutable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::ast::{is_identifier, BinOp, FunctionDecl};
use super::error::ErrorKind;

pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Int(i64),
    /// Only produced by the host (decoded JSON numbers).
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Record(Record),
    /// A built-in, referenced by its registry name.
    Native(String),
    Func(Arc<FunctionDecl>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Native(a), Native(b)) => a == b,
            (Func(a), Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// Strings print bare at the top level and quoted inside containers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => other.write_repr(f),
        }
    }
}

impl Value {
    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
            Value::Record(rec) => {
                f.write_str("{")?;
                for (i, (k, v)) in rec.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_identifier(k) {
                        write!(f, "{k} = ")?;
                    } else {
                        write!(f, "'{k}' = ")?;
                    }
                    v.write_repr(f)?;
                }
                f.write_str("}")
            }
            Value::Native(name) => write!(f, "<builtin {name}>"),
            Value::Func(decl) => write!(f, "<fn {decl}>"),
        }
    }

    /// Name of the type, as returned by `typeof()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Native(_) => "builtin",
            Value::Func(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Native(_) | Value::Func(_))
    }

    // ── Operators ─────────────────────────────────────────────────────────────

    /// Apply a binary operator to two evaluated operands.
    pub fn binary(&self, op: BinOp, rhs: &Value) -> Result<Value, ErrorKind> {
        match op {
            BinOp::Add => self.add(rhs),
            BinOp::Sub => self.sub(rhs),
            BinOp::Mul => self.arith(op, rhs),
            BinOp::Div => self.arith(op, rhs),
            BinOp::Eq => Ok(Value::Bool(self == rhs)),
            BinOp::Ne => Ok(Value::Bool(self != rhs)),
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => self.compare(op, rhs),
        }
    }

    fn mismatch(&self, op: BinOp, rhs: &Value) -> ErrorKind {
        ErrorKind::type_mismatch(format!(
            "cannot apply '{op}' to {} and {}",
            self.type_name(),
            rhs.type_name()
        ))
    }

    fn add(&self, rhs: &Value) -> Result<Value, ErrorKind> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(Value::List(out))
            }
            (Value::Record(a), Value::Record(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Value::Record(out))
            }
            _ => self.arith(BinOp::Add, rhs),
        }
    }

    fn sub(&self, rhs: &Value) -> Result<Value, ErrorKind> {
        match (self, rhs) {
            (Value::List(a), Value::List(b)) => {
                let mut out: Vec<Value> = Vec::new();
                for item in a {
                    if b.contains(item) && !out.contains(item) {
                        out.push(item.clone());
                    }
                }
                Ok(Value::List(out))
            }
            (Value::Record(a), Value::Record(b)) => Ok(Value::Record(
                a.iter()
                    .filter(|(k, v)| b.get(*k) == Some(*v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
            _ => self.arith(BinOp::Sub, rhs),
        }
    }

    /// Numeric `+ - * /`.  Two Ints stay Int (checked); any Float operand
    /// makes the result Float.
    fn arith(&self, op: BinOp, rhs: &Value) -> Result<Value, ErrorKind> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let r = match op {
                    BinOp::Add => a.checked_add(*b),
                    BinOp::Sub => a.checked_sub(*b),
                    BinOp::Mul => a.checked_mul(*b),
                    BinOp::Div => {
                        if *b == 0 {
                            return Err(ErrorKind::DivideByZero);
                        }
                        a.checked_div(*b)
                    }
                    _ => return Err(self.mismatch(op, rhs)),
                };
                r.map(Value::Int).ok_or(ErrorKind::Overflow)
            }
            _ => {
                let (Some(a), Some(b)) = (self.as_f64(), rhs.as_f64()) else {
                    return Err(self.mismatch(op, rhs));
                };
                let r = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(ErrorKind::DivideByZero);
                        }
                        a / b
                    }
                    _ => return Err(self.mismatch(op, rhs)),
                };
                Ok(Value::Float(r))
            }
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    fn compare(&self, op: BinOp, rhs: &Value) -> Result<Value, ErrorKind> {
        let ord = match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(self.mismatch(op, rhs)),
            },
        };
        let Some(ord) = ord else {
            return Ok(Value::Bool(false));
        };
        Ok(Value::Bool(match op {
            BinOp::Gt => ord.is_gt(),
            BinOp::Ge => ord.is_ge(),
            BinOp::Lt => ord.is_lt(),
            BinOp::Le => ord.is_le(),
            _ => return Err(self.mismatch(op, rhs)),
        }))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Value)]) -> Value {
        Value::Record(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn int_arithmetic() {
        let a = Value::Int(7);
        let b = Value::Int(2);
        assert_eq!(a.binary(BinOp::Add, &b), Ok(Value::Int(9)));
        assert_eq!(a.binary(BinOp::Sub, &b), Ok(Value::Int(5)));
        assert_eq!(a.binary(BinOp::Mul, &b), Ok(Value::Int(14)));
        assert_eq!(a.binary(BinOp::Div, &b), Ok(Value::Int(3)));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(
            Value::Int(-7).binary(BinOp::Div, &Value::Int(2)),
            Ok(Value::Int(-3))
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            Value::Int(10).binary(BinOp::Div, &Value::Int(0)),
            Err(ErrorKind::DivideByZero)
        );
        assert_eq!(
            Value::Float(1.0).binary(BinOp::Div, &Value::Int(0)),
            Err(ErrorKind::DivideByZero)
        );
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(
            Value::Int(i64::MAX).binary(BinOp::Add, &Value::Int(1)),
            Err(ErrorKind::Overflow)
        );
        assert_eq!(
            Value::Int(i64::MIN).binary(BinOp::Div, &Value::Int(-1)),
            Err(ErrorKind::Overflow)
        );
    }

    #[test]
    fn float_promotion() {
        assert_eq!(
            Value::Int(1).binary(BinOp::Add, &Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            Value::Float(2.5).binary(BinOp::Gt, &Value::Int(2)),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn string_concat_and_mismatch() {
        assert_eq!(
            Value::from("a").binary(BinOp::Add, &Value::from("b")),
            Ok(Value::from("ab"))
        );
        assert!(matches!(
            Value::from("a").binary(BinOp::Add, &Value::Int(1)),
            Err(ErrorKind::TypeMismatch(_))
        ));
        assert!(matches!(
            Value::from("a").binary(BinOp::Lt, &Value::from("b")),
            Err(ErrorKind::TypeMismatch(_))
        ));
    }

    #[test]
    fn list_concat_and_intersection() {
        assert_eq!(
            list(&[1, 2]).binary(BinOp::Add, &list(&[2, 3])),
            Ok(list(&[1, 2, 2, 3]))
        );
        assert_eq!(
            list(&[3, 1, 2, 1]).binary(BinOp::Sub, &list(&[1, 3, 9])),
            Ok(list(&[3, 1]))
        );
    }

    #[test]
    fn record_union_right_wins() {
        let a = rec(&[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let b = rec(&[("y", Value::Int(20)), ("z", Value::Int(3))]);
        assert_eq!(
            a.binary(BinOp::Add, &b),
            Ok(rec(&[
                ("x", Value::Int(1)),
                ("y", Value::Int(20)),
                ("z", Value::Int(3))
            ]))
        );
    }

    #[test]
    fn record_intersection_needs_equal_values() {
        let a = rec(&[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let b = rec(&[("x", Value::Int(1)), ("y", Value::Int(3))]);
        assert_eq!(
            a.binary(BinOp::Sub, &b),
            Ok(rec(&[("x", Value::Int(1))]))
        );
    }

    #[test]
    fn structural_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(1), Value::from("1"));
        assert_eq!(list(&[1, 2]), list(&[1, 2]));
        assert_ne!(list(&[1, 2]), list(&[2, 1]));
        assert_eq!(
            Value::Nil.binary(BinOp::Eq, &Value::Nil),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            Value::Nil.binary(BinOp::Ne, &Value::Int(0)),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a"), Value::Nil]).to_string(),
            "[1, 'a', nil]"
        );
        assert_eq!(
            rec(&[("X-Id", Value::Int(1)), ("b", Value::Bool(true))]).to_string(),
            "{'X-Id' = 1, b = true}"
        );
        assert_eq!(Value::Native("len".into()).to_string(), "<builtin len>");
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(rec(&[]).type_name(), "record");
        assert_eq!(Value::Native("x".into()).type_name(), "builtin");
    }
}
