//! Tree-walking evaluator.

use super::ast::{Expr, LogicalOp, UnaryOp};
use crate::builtins::{Functions, logical_elementwise, select};
use crate::error::EvalError;
use crate::scope::Scope;
use crate::value::{self, Value, broadcast1};

/// Evaluate `expr`, resolving names in `scope` and calls in `functions`.
///
/// Scalar `and`/`or`, comparison chains and conditionals short-circuit: the
/// operand that is not needed is never evaluated, so `False and 1 / 0` is
/// `False`. When the deciding operand is an array every operand is
/// evaluated and the result is combined element-wise.
pub fn eval(expr: &Expr, scope: &dyn Scope, functions: &Functions) -> Result<Value, EvalError> {
    Evaluator { scope, functions }.eval(expr)
}

struct Evaluator<'a> {
    scope: &'a dyn Scope,
    functions: &'a Functions,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => value::negate(&operand),
                    UnaryOp::Pos => value::positive(&operand),
                    UnaryOp::Not => broadcast1(&operand, &|v| Ok(Value::Bool(!v.truthy()?))),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                value::binary(*op, &left, &right)
            }
            Expr::Compare { first, rest } => self.compare_chain(first, rest),
            Expr::Logical { op, left, right } => self.logical(*op, left, right),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval(condition)?;
                if condition.is_array() {
                    let then_value = self.eval(then_branch)?;
                    let else_value = self.eval(else_branch)?;
                    select(&condition, &then_value, &else_value)
                } else if condition.truthy()? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Call { function, args } => self.call(function, args),
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                value::index(&target, &index)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.scope.lookup(name) {
            return Ok(value.clone());
        }
        if self.functions.contains(name) {
            return Err(EvalError::type_error(format!(
                "function '{}' cannot be used as a value",
                name
            )));
        }
        Err(EvalError::Name(name.to_string()))
    }

    fn logical(&self, op: LogicalOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let lhs = self.eval(left)?;
        if lhs.is_array() {
            let rhs = self.eval(right)?;
            return logical_elementwise(op == LogicalOp::And, &lhs, &rhs);
        }
        let lhs = lhs.truthy()?;
        match (op, lhs) {
            (LogicalOp::And, false) => Ok(Value::Bool(false)),
            (LogicalOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let rhs = self.eval(right)?;
                if rhs.is_array() {
                    logical_elementwise(op == LogicalOp::And, &Value::Bool(lhs), &rhs)
                } else {
                    Ok(Value::Bool(rhs.truthy()?))
                }
            }
        }
    }

    fn compare_chain(
        &self,
        first: &Expr,
        rest: &[(super::ast::CompareOp, Expr)],
    ) -> Result<Value, EvalError> {
        let mut left = self.eval(first)?;
        let mut combined: Option<Value> = None;
        for (op, operand) in rest {
            let right = self.eval(operand)?;
            let step = value::compare(*op, &left, &right)?;
            combined = Some(match combined {
                None => step,
                Some(prev) => logical_elementwise(true, &prev, &step)?,
            });
            if let Some(Value::Bool(false)) = combined {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(combined.unwrap_or(Value::Bool(true)))
    }

    fn call(&self, function: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let Some(builtin) = self.functions.get(function) else {
            return Err(EvalError::Name(function.to_string()));
        };
        if !builtin.arity.accepts(args.len()) {
            return Err(EvalError::Arity {
                name: function.to_string(),
                expected: builtin.arity.to_string(),
                got: args.len(),
            });
        }
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        (builtin.func)(&args)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::parse;
    use crate::scope::EmptyScope;

    fn run(source: &str, scope: &dyn Scope) -> Result<Value, EvalError> {
        let expr = parse(source).unwrap();
        eval(&expr, scope, &Functions::builtin())
    }

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_arithmetic_and_names() {
        let scope = vars(&[("a", Value::Int(10)), ("parameter_x", Value::Int(10))]);
        assert_eq!(run("a * 2 * parameter_x", &scope), Ok(Value::Int(200)));
        assert_eq!(run("sqrt(a - 1)", &scope), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(run("x + 1", &EmptyScope), Err(EvalError::Name("x".into())));
        assert_eq!(run("nope(1)", &EmptyScope), Err(EvalError::Name("nope".into())));
    }

    #[test]
    fn test_function_name_is_not_a_value() {
        assert!(matches!(run("sqrt + 1", &EmptyScope), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        assert_eq!(run("False and 1 / 0", &EmptyScope), Ok(Value::Bool(false)));
        assert_eq!(run("True or 1 / 0", &EmptyScope), Ok(Value::Bool(true)));
        assert_eq!(run("1 > 2 > 1 / 0", &EmptyScope), Ok(Value::Bool(false)));
        assert_eq!(run("True ? 1 : 1 / 0", &EmptyScope), Ok(Value::Int(1)));
        assert_eq!(run("1 / 0 if False else 2", &EmptyScope), Ok(Value::Int(2)));
        assert_eq!(run("1 / 0", &EmptyScope), Err(EvalError::ZeroDivision));
    }

    #[test]
    fn test_logical_returns_bool() {
        assert_eq!(run("1 and 2", &EmptyScope), Ok(Value::Bool(true)));
        assert_eq!(run("0 or ''", &EmptyScope), Ok(Value::Bool(false)));
        assert_eq!(run("!0", &EmptyScope), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_chained_comparison() {
        let scope = vars(&[("x", Value::Int(5))]);
        assert_eq!(run("1 < x <= 5", &scope), Ok(Value::Bool(true)));
        assert_eq!(run("1 < x < 5", &scope), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_condition_sees_bound_value() {
        let scope = vars(&[("c", Value::Float(-3.0))]);
        assert_eq!(run("c < 0 ? -c : c", &scope), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_vectorized_conditional_and_logic() {
        let scope = vars(&[("a", Value::from(vec![1i64, 5, 10]))]);
        assert_eq!(
            run("a > 4 ? a : 0", &scope),
            Ok(Value::from(vec![0i64, 5, 10]))
        );
        assert_eq!(
            run("a > 1 and a < 10", &scope),
            Ok(Value::from(vec![false, true, false]))
        );
        assert_eq!(
            run("not (a == 5)", &scope),
            Ok(Value::from(vec![true, false, true]))
        );
        assert_eq!(
            run("1 < a < 10", &scope),
            Ok(Value::from(vec![false, true, false]))
        );
    }

    #[test]
    fn test_array_condition_broadcasts_scalar_branches() {
        let scope = vars(&[("a", Value::from(vec![1i64, 0]))]);
        assert_eq!(run("sum(a) if a else -1", &scope), Ok(Value::from(vec![1i64, -1])));
        assert_eq!(run("where(a, 'y', 'n')", &scope), Ok(Value::from(vec!["y", "n"])));
    }

    #[test]
    fn test_reference_row_map() {
        let mut row = std::collections::BTreeMap::new();
        row.insert("col1".to_string(), Value::Int(30));
        let scope = vars(&[("reference_table", Value::Map(row))]);
        assert_eq!(run("reference_table[\"col1\"]", &scope), Ok(Value::Int(30)));
        assert_eq!(
            run("reference_table['missing']", &scope),
            Err(EvalError::Key("missing".into()))
        );
    }

    #[test]
    fn test_arity_checked_before_arguments_run() {
        assert!(matches!(
            run("sqrt(1, 1 / 0)", &EmptyScope),
            Err(EvalError::Arity { got: 2, .. })
        ));
    }

    #[test]
    fn test_empty_registry_has_no_functions() {
        let expr = parse("sqrt(4)").unwrap();
        assert_eq!(
            eval(&expr, &EmptyScope, &Functions::empty()),
            Err(EvalError::Name("sqrt".into()))
        );
    }
}
