//! Allow-listed functions callable from formulas.
//!
//! Conventions:
//! - Names are lowercase (e.g. `sqrt`, `where`).
//! - Math functions broadcast element-wise over arrays.
//! - The registry is closed: formulas can call exactly what is listed in
//!   [`BUILTINS`] (or what a host registers on a [`Functions`] before handing
//!   it to an engine), nothing else. Adding an entry widens what untrusted
//!   formulas can do.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::EvalError;
use crate::value::{Value, broadcast1, broadcast2, scalar_order};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub description: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "sqrt",
        arity: Arity::Exact(1),
        description: "Square root",
        func: sqrt,
    },
    Builtin {
        name: "abs",
        arity: Arity::Exact(1),
        description: "Absolute value",
        func: abs,
    },
    Builtin {
        name: "round",
        arity: Arity::Range(1, 2),
        description: "Round half to even; with digits, to that many decimals",
        func: round,
    },
    Builtin {
        name: "floor",
        arity: Arity::Exact(1),
        description: "Largest integer not greater than x",
        func: floor,
    },
    Builtin {
        name: "ceil",
        arity: Arity::Exact(1),
        description: "Smallest integer not less than x",
        func: ceil,
    },
    Builtin {
        name: "exp",
        arity: Arity::Exact(1),
        description: "e raised to x",
        func: exp,
    },
    Builtin {
        name: "log",
        arity: Arity::Range(1, 2),
        description: "Natural logarithm, or logarithm to the given base",
        func: log,
    },
    Builtin {
        name: "log10",
        arity: Arity::Exact(1),
        description: "Base-10 logarithm",
        func: log10,
    },
    Builtin {
        name: "sin",
        arity: Arity::Exact(1),
        description: "Sine (radians)",
        func: sin,
    },
    Builtin {
        name: "cos",
        arity: Arity::Exact(1),
        description: "Cosine (radians)",
        func: cos,
    },
    Builtin {
        name: "tan",
        arity: Arity::Exact(1),
        description: "Tangent (radians)",
        func: tan,
    },
    Builtin {
        name: "min",
        arity: Arity::AtLeast(1),
        description: "Smallest of the arguments, or of a single array",
        func: min,
    },
    Builtin {
        name: "max",
        arity: Arity::AtLeast(1),
        description: "Largest of the arguments, or of a single array",
        func: max,
    },
    Builtin {
        name: "sum",
        arity: Arity::Exact(1),
        description: "Sum of an array",
        func: sum,
    },
    Builtin {
        name: "mean",
        arity: Arity::Exact(1),
        description: "Arithmetic mean of an array",
        func: mean,
    },
    Builtin {
        name: "len",
        arity: Arity::Exact(1),
        description: "Length of an array, string or map",
        func: len,
    },
    Builtin {
        name: "int",
        arity: Arity::Exact(1),
        description: "Convert to integer (truncates floats, parses strings)",
        func: to_int,
    },
    Builtin {
        name: "float",
        arity: Arity::Exact(1),
        description: "Convert to float",
        func: to_float,
    },
    Builtin {
        name: "str",
        arity: Arity::Exact(1),
        description: "Convert to string",
        func: to_str,
    },
    Builtin {
        name: "where",
        arity: Arity::Exact(3),
        description: "Element-wise choice: where(cond, a, b)",
        func: where_,
    },
];

/// The function registry handed to an engine.
#[derive(Clone, Debug, Default)]
pub struct Functions {
    table: BTreeMap<&'static str, Builtin>,
}

impl Functions {
    /// A registry with no functions at all.
    pub fn empty() -> Self {
        Functions::default()
    }

    /// The standard registry: every entry of [`BUILTINS`].
    pub fn builtin() -> Self {
        BUILTINS.iter().fold(Functions::empty(), |fns, b| fns.with(*b))
    }

    /// Add (or replace) a function.
    pub fn with(mut self, builtin: Builtin) -> Self {
        self.table.insert(builtin.name, builtin);
        self
    }

    /// Remove a function from the registry.
    pub fn without(mut self, name: &str) -> Self {
        self.table.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let builtin = self
            .get(name)
            .ok_or_else(|| EvalError::Name(name.to_string()))?;
        if !builtin.arity.accepts(args.len()) {
            return Err(EvalError::Arity {
                name: name.to_string(),
                expected: builtin.arity.to_string(),
                got: args.len(),
            });
        }
        (builtin.func)(args)
    }
}

fn number(name: &'static str, value: &Value) -> Result<f64, EvalError> {
    value.as_f64().ok_or_else(|| {
        EvalError::type_error(format!(
            "{}() requires a number, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn math1(
    name: &'static str,
    value: &Value,
    domain: fn(f64) -> bool,
    f: fn(f64) -> f64,
) -> Result<Value, EvalError> {
    broadcast1(value, &|v| {
        let x = number(name, v)?;
        if !domain(x) {
            return Err(EvalError::Domain(name));
        }
        Ok(Value::Float(f(x)))
    })
}

fn any(_: f64) -> bool {
    true
}

fn sqrt(args: &[Value]) -> Result<Value, EvalError> {
    math1("sqrt", &args[0], |x| x >= 0.0, f64::sqrt)
}

fn exp(args: &[Value]) -> Result<Value, EvalError> {
    math1("exp", &args[0], any, f64::exp)
}

fn log(args: &[Value]) -> Result<Value, EvalError> {
    let natural = math1("log", &args[0], |x| x > 0.0, f64::ln)?;
    match args.get(1) {
        None => Ok(natural),
        Some(base) => {
            let base = number("log", base)?;
            if base <= 0.0 || base == 1.0 {
                return Err(EvalError::Domain("log"));
            }
            crate::value::binary(crate::expr::BinaryOp::Div, &natural, &Value::Float(base.ln()))
        }
    }
}

fn log10(args: &[Value]) -> Result<Value, EvalError> {
    math1("log10", &args[0], |x| x > 0.0, f64::log10)
}

fn sin(args: &[Value]) -> Result<Value, EvalError> {
    math1("sin", &args[0], f64::is_finite, f64::sin)
}

fn cos(args: &[Value]) -> Result<Value, EvalError> {
    math1("cos", &args[0], f64::is_finite, f64::cos)
}

fn tan(args: &[Value]) -> Result<Value, EvalError> {
    math1("tan", &args[0], f64::is_finite, f64::tan)
}

fn abs(args: &[Value]) -> Result<Value, EvalError> {
    broadcast1(&args[0], &|v| match v {
        Value::Int(i) => Ok(i.checked_abs().map_or(Value::Float((*i as f64).abs()), Value::Int)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => Ok(Value::Float(number("abs", other)?.abs())),
    })
}

fn float_to_int(name: &'static str, x: f64) -> Result<Value, EvalError> {
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(EvalError::Domain(name));
    }
    Ok(Value::Int(x as i64))
}

fn floor(args: &[Value]) -> Result<Value, EvalError> {
    broadcast1(&args[0], &|v| match v {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => float_to_int("floor", number("floor", other)?.floor()),
    })
}

fn ceil(args: &[Value]) -> Result<Value, EvalError> {
    broadcast1(&args[0], &|v| match v {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => float_to_int("ceil", number("ceil", other)?.ceil()),
    })
}

fn round(args: &[Value]) -> Result<Value, EvalError> {
    match args.get(1) {
        None => broadcast1(&args[0], &|v| match v {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            other => float_to_int("round", number("round", other)?.round_ties_even()),
        }),
        Some(Value::Int(digits)) => {
            let digits = i32::try_from(*digits).map_err(|_| EvalError::Domain("round"))?;
            let scale = 10f64.powi(digits);
            broadcast1(&args[0], &|v| match v {
                Value::Int(i) if digits >= 0 => Ok(Value::Int(*i)),
                Value::Int(i) => Ok(round_int(*i, digits.unsigned_abs())),
                Value::Bool(b) => Ok(round_int(*b as i64, digits.unsigned_abs())),
                other => {
                    let x = number("round", other)?;
                    Ok(Value::Float((x * scale).round_ties_even() / scale))
                }
            })
        }
        Some(other) => Err(EvalError::type_error(format!(
            "round() digits must be int, not '{}'",
            other.type_name()
        ))),
    }
}

/// Round an int to a multiple of `10^places`, half to even. Results that
/// leave the int range widen to float.
fn round_int(i: i64, places: u32) -> Value {
    let Some(unit) = 10i128.checked_pow(places) else {
        return Value::Int(0);
    };
    let (quotient, remainder) = (i128::from(i).div_euclid(unit), i128::from(i).rem_euclid(unit));
    let round_up = 2 * remainder > unit || (2 * remainder == unit && quotient % 2 != 0);
    let rounded = (quotient + i128::from(round_up)) * unit;
    i64::try_from(rounded).map_or(Value::Float(rounded as f64), Value::Int)
}

fn extreme(name: &'static str, args: &[Value], keep: std::cmp::Ordering) -> Result<Value, EvalError> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        [single] => {
            return Err(EvalError::type_error(format!(
                "{}() of a single '{}' is not supported; pass an array or several values",
                name,
                single.type_name()
            )));
        }
        many => many,
    };
    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            None => Some(item),
            Some(current) => {
                let ordering = scalar_order(item, current).ok_or_else(|| {
                    EvalError::type_error(format!(
                        "{}() cannot compare '{}' and '{}'",
                        name,
                        item.type_name(),
                        current.type_name()
                    ))
                })?;
                if ordering == Some(keep) {
                    Some(item)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.cloned()
        .ok_or_else(|| EvalError::type_error(format!("{}() arg is an empty sequence", name)))
}

fn min(args: &[Value]) -> Result<Value, EvalError> {
    extreme("min", args, std::cmp::Ordering::Less)
}

fn max(args: &[Value]) -> Result<Value, EvalError> {
    extreme("max", args, std::cmp::Ordering::Greater)
}

fn array_arg<'a>(name: &'static str, value: &'a Value) -> Result<&'a [Value], EvalError> {
    value.as_array().ok_or_else(|| {
        EvalError::type_error(format!(
            "{}() requires an array, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn sum(args: &[Value]) -> Result<Value, EvalError> {
    let items = array_arg("sum", &args[0])?;
    items.iter().try_fold(Value::Int(0), |acc, item| {
        crate::value::binary(crate::expr::BinaryOp::Add, &acc, item)
    })
}

fn mean(args: &[Value]) -> Result<Value, EvalError> {
    let items = array_arg("mean", &args[0])?;
    if items.is_empty() {
        return Err(EvalError::ZeroDivision);
    }
    let total = sum(args)?;
    crate::value::binary(
        crate::expr::BinaryOp::Div,
        &total,
        &Value::Int(items.len() as i64),
    )
}

fn len(args: &[Value]) -> Result<Value, EvalError> {
    let n = match &args[0] {
        Value::Array(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Map(map) => map.len(),
        other => {
            return Err(EvalError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(n as i64))
}

fn to_int(args: &[Value]) -> Result<Value, EvalError> {
    broadcast1(&args[0], &|v| match v {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) => float_to_int("int", f.trunc()),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::type_error(format!("invalid literal for int(): {:?}", s))
        }),
        other => Err(EvalError::type_error(format!(
            "int() argument must be a number or string, not '{}'",
            other.type_name()
        ))),
    })
}

fn to_float(args: &[Value]) -> Result<Value, EvalError> {
    broadcast1(&args[0], &|v| match v {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::type_error(format!("could not convert string to float: {:?}", s))
        }),
        other => Ok(Value::Float(number("float", other)?)),
    })
}

fn to_str(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Str(args[0].to_string()))
}

fn where_(args: &[Value]) -> Result<Value, EvalError> {
    select(&args[0], &args[1], &args[2])
}

/// Element-wise `cond ? a : b`; `a` and `b` broadcast against `cond`.
pub(crate) fn select(cond: &Value, a: &Value, b: &Value) -> Result<Value, EvalError> {
    match cond {
        Value::Array(mask) => {
            let pick = |branch: &Value, i: usize| -> Result<Value, EvalError> {
                match branch {
                    Value::Array(items) if items.len() == mask.len() => Ok(items[i].clone()),
                    Value::Array(items) => Err(EvalError::type_error(format!(
                        "operands could not be broadcast together with lengths {} and {}",
                        mask.len(),
                        items.len()
                    ))),
                    scalar => Ok(scalar.clone()),
                }
            };
            mask.iter()
                .enumerate()
                .map(|(i, m)| {
                    let a_i = pick(a, i)?;
                    let b_i = pick(b, i)?;
                    select(m, &a_i, &b_i)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        scalar => {
            if scalar.truthy()? {
                Ok(a.clone())
            } else {
                Ok(b.clone())
            }
        }
    }
}

/// Element-wise boolean combination used when an operand of `and`/`or` is
/// an array.
pub(crate) fn logical_elementwise(and: bool, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    broadcast2(lhs, rhs, &|l, r| {
        let (l, r) = (l.truthy()?, r.truthy()?);
        Ok(Value::Bool(if and { l && r } else { l || r }))
    })
}
