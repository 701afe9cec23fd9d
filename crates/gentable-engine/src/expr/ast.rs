//! Expression tree.
//!
//! `Display` prints the canonical grammar: `and`/`or`/`not`, `True`/`False`,
//! and conditionals as `(then) if (cond) else (else)`. Compound operands are
//! parenthesized, except the left side of a chain on one precedence level
//! (`a - b + c`), so printing and re-parsing yields an identical tree.

use std::fmt;

use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` keeps every operand so the middle ones are evaluated once.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    /// Left-associative chains share a level; the left operand of an
    /// operator on the same level prints without parentheses.
    fn chain_level(&self) -> Option<u8> {
        match self {
            Expr::Binary {
                op: BinaryOp::Add | BinaryOp::Sub,
                ..
            } => Some(1),
            Expr::Binary {
                op: BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod,
                ..
            } => Some(2),
            Expr::Logical {
                op: LogicalOp::Or, ..
            } => Some(3),
            Expr::Logical {
                op: LogicalOp::And,
                ..
            } => Some(4),
            _ => None,
        }
    }

    fn is_atom(&self) -> bool {
        match self {
            Expr::Literal(Value::Int(i)) => *i >= 0,
            Expr::Literal(Value::Float(f)) => f.is_finite() && f.is_sign_positive(),
            Expr::Literal(_)
            | Expr::Name(_)
            | Expr::List(_)
            | Expr::Call { .. }
            | Expr::Index { .. } => true,
            _ => false,
        }
    }
}

struct Operand<'a>(&'a Expr);

/// Left operand of `parent`: same-level chains are written flat.
struct LeftOperand<'a>(&'a Expr, &'a Expr);

impl fmt::Display for LeftOperand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let LeftOperand(left, parent) = *self;
        if left.chain_level().is_some() && left.chain_level() == parent.chain_level() {
            write!(f, "{}", left)
        } else {
            write!(f, "{}", Operand(left))
        }
    }
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_atom() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Float(x) if x.is_infinite() => {
            write!(f, "{}", if *x > 0.0 { "1e999" } else { "-1e999" })
        }
        Value::Float(x) if x.is_nan() => write!(f, "float(\"nan\")"),
        Value::Array(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_literal(f, item)?;
            }
            write!(f, "]")
        }
        other => write!(f, "{}", other.repr()),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write_literal(f, value),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{}", Operand(operand)),
                UnaryOp::Pos => write!(f, "+{}", Operand(operand)),
                UnaryOp::Not => write!(f, "not {}", Operand(operand)),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "{} {} {}", LeftOperand(left, self), op, Operand(right))
            }
            Expr::Compare { first, rest } => {
                write!(f, "{}", Operand(first))?;
                for (op, operand) in rest {
                    write!(f, " {} {}", op, Operand(operand))?;
                }
                Ok(())
            }
            Expr::Logical { op, left, right } => {
                write!(f, "{} {} {}", LeftOperand(left, self), op, Operand(right))
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(
                f,
                "({}) if ({}) else ({})",
                then_branch, condition, else_branch
            ),
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Index { target, index } => write!(f, "{}[{}]", Operand(target), index),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or => write!(f, "or"),
        }
    }
}
