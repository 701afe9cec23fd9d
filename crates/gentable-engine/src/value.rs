//! Runtime values and the operators defined on them.
//!
//! Numbers follow host promotion rules: `bool` acts as an integer in
//! arithmetic, `int` widens to `float` when mixed (or when integer
//! arithmetic overflows), and `/` is always true division.
//!
//! Arrays broadcast: a binary operator with an array operand is applied
//! element-wise, pairing elements when both sides are arrays of the same
//! length and repeating the scalar otherwise.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EvalError;
use crate::expr::{BinaryOp, CompareOp};

/// Repetition of strings is capped so a single formula cannot allocate
/// unbounded memory.
const MAX_STRING_LEN: usize = 10_000_000;

/// A value produced or consumed by a formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Null => "None",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        Number::of(self).map(Number::as_f64)
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Truth value used by conditionals, boolean operators and stop conditions.
    ///
    /// Arrays have no single truth value; use `where()` or an element-wise
    /// conditional instead.
    pub fn truthy(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::Map(m) => Ok(!m.is_empty()),
            Value::Null => Ok(false),
            Value::Array(items) => Err(EvalError::type_error(format!(
                "the truth value of an array with {} element(s) is ambiguous",
                items.len()
            ))),
        }
    }

    /// Source-level spelling of the value; parsing it yields the same value.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "None"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", quote(key), item.repr())?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Format a float so that it reads back as a float (`2.0`, not `2`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", x)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[derive(Clone, Copy, Debug)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// Apply `f` element-wise when either side is an array, otherwise directly.
pub(crate) fn broadcast2<F>(lhs: &Value, rhs: &Value, f: &F) -> Result<Value, EvalError>
where
    F: Fn(&Value, &Value) -> Result<Value, EvalError>,
{
    match (lhs, rhs) {
        (Value::Array(l), Value::Array(r)) => {
            if l.len() != r.len() {
                return Err(EvalError::type_error(format!(
                    "operands could not be broadcast together with lengths {} and {}",
                    l.len(),
                    r.len()
                )));
            }
            l.iter()
                .zip(r)
                .map(|(a, b)| broadcast2(a, b, f))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        (Value::Array(l), r) => l
            .iter()
            .map(|a| broadcast2(a, r, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (l, Value::Array(r)) => r
            .iter()
            .map(|b| broadcast2(l, b, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (l, r) => f(l, r),
    }
}

/// Apply `f` to every scalar inside a (possibly nested) array.
pub(crate) fn broadcast1<F>(value: &Value, f: &F) -> Result<Value, EvalError>
where
    F: Fn(&Value) -> Result<Value, EvalError>,
{
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| broadcast1(item, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => f(scalar),
    }
}

/// Evaluate `lhs op rhs`.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    broadcast2(lhs, rhs, &|l, r| scalar_binary(op, l, r))
}

fn scalar_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(*n).unwrap_or(0);
            if s.len().saturating_mul(count) > MAX_STRING_LEN {
                return Err(EvalError::type_error("string repetition result is too large"));
            }
            return Ok(Value::Str(s.repeat(count)));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (Number::of(lhs), Number::of(rhs)) else {
        return Err(EvalError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            lhs.type_name(),
            rhs.type_name()
        )));
    };
    numeric_binary(op, a, b)
}

fn numeric_binary(op: BinaryOp, a: Number, b: Number) -> Result<Value, EvalError> {
    use Number::Int;

    let value = match (op, a, b) {
        (BinaryOp::Div, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float(a.as_f64() / divisor)
        }
        (BinaryOp::Add, Int(x), Int(y)) => x
            .checked_add(y)
            .map_or(Value::Float(x as f64 + y as f64), Value::Int),
        (BinaryOp::Sub, Int(x), Int(y)) => x
            .checked_sub(y)
            .map_or(Value::Float(x as f64 - y as f64), Value::Int),
        (BinaryOp::Mul, Int(x), Int(y)) => x
            .checked_mul(y)
            .map_or(Value::Float(x as f64 * y as f64), Value::Int),
        (BinaryOp::Mod, Int(x), Int(y)) => {
            if y == 0 {
                return Err(EvalError::ZeroDivision);
            }
            let mut r = x.checked_rem(y).unwrap_or(0);
            // Result takes the sign of the divisor.
            if r != 0 && (r < 0) != (y < 0) {
                r += y;
            }
            Value::Int(r)
        }
        (BinaryOp::Pow, Int(x), Int(y)) if y >= 0 => u32::try_from(y)
            .ok()
            .and_then(|exp| x.checked_pow(exp))
            .map_or(Value::Float((x as f64).powf(y as f64)), Value::Int),
        (BinaryOp::Add, _, _) => Value::Float(a.as_f64() + b.as_f64()),
        (BinaryOp::Sub, _, _) => Value::Float(a.as_f64() - b.as_f64()),
        (BinaryOp::Mul, _, _) => Value::Float(a.as_f64() * b.as_f64()),
        (BinaryOp::Mod, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if y == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            let mut r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r += y;
            }
            Value::Float(r)
        }
        (BinaryOp::Pow, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float(x.powf(y))
        }
    };
    Ok(value)
}

/// Evaluate `-value`.
pub fn negate(value: &Value) -> Result<Value, EvalError> {
    broadcast1(value, &|v| match Number::of(v) {
        Some(Number::Int(i)) => Ok(i
            .checked_neg()
            .map_or(Value::Float(-(i as f64)), Value::Int)),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(EvalError::type_error(format!(
            "bad operand type for unary -: '{}'",
            v.type_name()
        ))),
    })
}

/// Evaluate `+value` (numbers only; bools become ints).
pub fn positive(value: &Value) -> Result<Value, EvalError> {
    broadcast1(value, &|v| match Number::of(v) {
        Some(Number::Int(i)) => Ok(Value::Int(i)),
        Some(Number::Float(f)) => Ok(Value::Float(f)),
        None => Err(EvalError::type_error(format!(
            "bad operand type for unary +: '{}'",
            v.type_name()
        ))),
    })
}

/// Evaluate `lhs op rhs` for a comparison operator, element-wise over arrays.
pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    broadcast2(lhs, rhs, &|l, r| scalar_compare(op, l, r).map(Value::Bool))
}

fn scalar_compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(scalar_eq(lhs, rhs)),
        CompareOp::Ne => Ok(!scalar_eq(lhs, rhs)),
        _ => {
            let ordering = scalar_order(lhs, rhs).ok_or_else(|| {
                EvalError::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                ))
            })?;
            // NaN compares false against everything.
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn scalar_eq(lhs: &Value, rhs: &Value) -> bool {
    match (Number::of(lhs), Number::of(rhs)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

/// `None` when the kinds are not ordered; `Some(None)` for NaN.
pub(crate) fn scalar_order(lhs: &Value, rhs: &Value) -> Option<Option<Ordering>> {
    match (Number::of(lhs), Number::of(rhs)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Some(Some(a.cmp(&b))),
        (Some(a), Some(b)) => Some(a.as_f64().partial_cmp(&b.as_f64())),
        _ => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(Some(a.cmp(b))),
            _ => None,
        },
    }
}

/// Evaluate `target[index]`.
pub fn index(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Array(items), idx) => {
            let i = integer_index(idx)?;
            resolve_index(i, items.len()).map(|pos| items[pos].clone())
        }
        (Value::Str(s), idx) => {
            let i = integer_index(idx)?;
            let chars: Vec<char> = s.chars().collect();
            resolve_index(i, chars.len()).map(|pos| Value::Str(chars[pos].to_string()))
        }
        (Value::Map(map), Value::Str(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::Key(key.clone())),
        (Value::Map(_), other) => Err(EvalError::type_error(format!(
            "map keys must be str, not '{}'",
            other.type_name()
        ))),
        (other, _) => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn integer_index(index: &Value) -> Result<i64, EvalError> {
    match index {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(*b as i64),
        other => Err(EvalError::type_error(format!(
            "indices must be integers, not '{}'",
            other.type_name()
        ))),
    }
}

fn resolve_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let out_of_range = || EvalError::Index { index, len };
    if index < 0 {
        let back = usize::try_from(index.unsigned_abs()).map_err(|_| out_of_range())?;
        len.checked_sub(back).ok_or_else(out_of_range)
    } else {
        let pos = usize::try_from(index).map_err(|_| out_of_range())?;
        if pos < len { Ok(pos) } else { Err(out_of_range()) }
    }
}
