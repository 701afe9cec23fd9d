use std::collections::HashMap;

use gentable_engine::{
    Arity, Builtin, EmptyScope, Engine, EvalError, FormulaError, Functions, Value, normalize,
};

fn scope(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn surface_and_canonical_forms_evaluate_alike() {
    let engine = Engine::new();
    for a in [3i64, 5, 9] {
        let ctx = scope(&[("a", Value::Int(a))]);
        let surface = engine.eval("a > 5 ? STOP : CONTINUE", &ctx).unwrap();
        let canonical = engine
            .eval(&normalize("a > 5 ? STOP : CONTINUE").unwrap(), &ctx)
            .unwrap();
        assert_eq!(surface, canonical);
        assert_eq!(surface, Value::Bool(a > 5));
    }
}

#[test]
fn whole_column_formulas_broadcast() {
    let engine = Engine::new();
    let mut reference = std::collections::BTreeMap::new();
    reference.insert("col1".to_string(), Value::from(vec![1i64, 2, 3]));
    let ctx = scope(&[
        ("reference_table", Value::Map(reference)),
        ("parameter_x", Value::Int(10)),
    ]);
    assert_eq!(
        engine.eval("reference_table['col1'] * 2 * parameter_x", &ctx),
        Ok(Value::from(vec![20i64, 40, 60]))
    );
    assert_eq!(
        engine.eval("sqrt(reference_table['col1'] ** 2)", &ctx),
        Ok(Value::from(vec![1.0, 2.0, 3.0]))
    );
}

#[test]
fn host_can_extend_the_registry() {
    fn double(args: &[Value]) -> Result<Value, EvalError> {
        gentable_engine::value::binary(
            gentable_engine::expr::BinaryOp::Mul,
            &args[0],
            &Value::Int(2),
        )
    }
    let functions = Functions::builtin().with(Builtin {
        name: "double",
        arity: Arity::Exact(1),
        description: "Twice x",
        func: double,
    });
    let engine = Engine::with_functions(functions);
    assert_eq!(engine.eval("double(21)", &EmptyScope), Ok(Value::Int(42)));
    assert!(matches!(
        Engine::new().eval("double(21)", &EmptyScope),
        Err(FormulaError::Eval(EvalError::Name(_)))
    ));
}

#[test]
fn no_escape_hatches() {
    let engine = Engine::new();
    for source in ["__import__('os')", "open('x')", "eval('1')", "a.b", "x = 1", "lambda: 1"] {
        assert!(
            engine.eval(source, &EmptyScope).is_err(),
            "{} should not evaluate",
            source
        );
    }
}

/// Formulas at the edge of the nesting and chain limits parse and evaluate
/// on a thread with the default 2 MiB stack; one step past is an error.
#[test]
fn limits_fit_in_a_small_thread_stack() {
    std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(|| {
            let engine = Engine::new();
            let parens = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));

            assert_eq!(engine.eval(&parens(63), &EmptyScope), Ok(Value::Int(1)));
            assert!(matches!(
                engine.eval(&parens(64), &EmptyScope),
                Err(FormulaError::Parse(_))
            ));
            assert!(engine.eval(&parens(5000), &EmptyScope).is_err());

            let negations = format!("{}1", "-".repeat(62));
            assert_eq!(engine.eval(&negations, &EmptyScope), Ok(Value::Int(1)));

            let sum = vec!["1"; 390].join(" + ");
            assert_eq!(engine.eval(&sum, &EmptyScope), Ok(Value::Int(390)));
            assert_eq!(normalize(&sum).as_deref(), Ok(sum.as_str()));

            let all = vec!["True"; 390].join(" and ");
            assert_eq!(engine.eval(&all, &EmptyScope), Ok(Value::Bool(true)));

            let nested_sum = format!(
                "{}{}{}",
                "(".repeat(60),
                vec!["1"; 300].join(" + "),
                ")".repeat(60)
            );
            assert_eq!(engine.eval(&nested_sum, &EmptyScope), Ok(Value::Int(300)));

            assert!(engine.eval(&vec!["1"; 5000].join(" + "), &EmptyScope).is_err());
        })
        .unwrap()
        .join()
        .unwrap();
}
