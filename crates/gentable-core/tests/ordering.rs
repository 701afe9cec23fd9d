use std::collections::HashMap;

use gentable_core::{ColumnSpec, Table, Value};
use proptest::prelude::*;

/// Random DAGs: column `i` may only depend on columns `0..i`, then the
/// insertion order is shuffled so the table has to reorder them.
fn acyclic_specs() -> impl Strategy<Value = Vec<ColumnSpec>> {
    (1usize..12)
        .prop_flat_map(|n| {
            let deps = (0..n)
                .map(|i| proptest::collection::vec(any::<bool>(), i))
                .collect::<Vec<_>>();
            (deps, Just((0..n).collect::<Vec<usize>>()).prop_shuffle())
        })
        .prop_map(|(deps, order)| {
            order
                .into_iter()
                .map(|i| {
                    let names: Vec<String> = deps[i]
                        .iter()
                        .enumerate()
                        .filter(|(_, on)| **on)
                        .map(|(j, _)| format!("c{}", j))
                        .collect();
                    let formula = if names.is_empty() {
                        "1".to_string()
                    } else {
                        names.join(" + ")
                    };
                    ColumnSpec::new(format!("c{}", i), formula).depends_on(names)
                })
                .collect()
        })
}

const PARAMETERS: usize = 3;

/// Column `i` reads a random subset of `c0..c{i}` and of `p0..p2`, plus a
/// constant so every formula has a distinct value.
fn parameter_dags() -> impl Strategy<Value = Vec<ColumnSpec>> {
    (1usize..10)
        .prop_flat_map(|n| {
            (0..n)
                .map(|i| {
                    (
                        proptest::collection::vec(any::<bool>(), i),
                        proptest::collection::vec(any::<bool>(), PARAMETERS),
                    )
                })
                .collect::<Vec<_>>()
        })
        .prop_map(|deps| {
            deps.into_iter()
                .enumerate()
                .map(|(i, (columns, parameters))| {
                    let names: Vec<String> = columns
                        .iter()
                        .enumerate()
                        .filter(|(_, on)| **on)
                        .map(|(j, _)| format!("c{}", j))
                        .chain(
                            parameters
                                .iter()
                                .enumerate()
                                .filter(|(_, on)| **on)
                                .map(|(k, _)| format!("p{}", k)),
                        )
                        .collect();
                    let mut terms = names.clone();
                    terms.push((i + 1).to_string());
                    ColumnSpec::new(format!("c{}", i), terms.join(" + ")).depends_on(names)
                })
                .collect()
        })
}

fn table_with(specs: &[ColumnSpec], parameters: &[i64]) -> Table {
    let mut table = Table::new();
    for (k, value) in parameters.iter().enumerate() {
        table
            .set_parameter(&format!("p{}", k), Value::Int(*value))
            .unwrap();
    }
    for spec in specs {
        table.add_column(spec).unwrap();
    }
    table
}

proptest! {
    #[test]
    fn evaluation_order_is_a_linearization(specs in acyclic_specs()) {
        let mut table = Table::new();
        for spec in &specs {
            table.add_column(spec).unwrap();
        }
        let order = table.evaluation_order();
        prop_assert_eq!(order.len(), specs.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        for spec in &specs {
            for dep in &spec.dependencies {
                prop_assert!(position[dep.as_str()] < position[spec.name.as_str()]);
            }
        }

        // Every formula only reads declared columns, so rows compute cleanly
        // and identically on every pass.
        let first = table.collect_rows().unwrap();
        prop_assert_eq!(first, table.collect_rows().unwrap());
    }
}

proptest! {
    #[test]
    fn incremental_recompute_matches_full_recompute(
        specs in parameter_dags(),
        before in proptest::collection::vec(-5i64..5, PARAMETERS),
        after in proptest::collection::vec(-5i64..5, PARAMETERS),
        changed in proptest::collection::vec(any::<bool>(), PARAMETERS),
    ) {
        let finals: Vec<i64> = (0..PARAMETERS)
            .map(|k| if changed[k] { after[k] } else { before[k] })
            .collect();
        let changed_names: Vec<String> = (0..PARAMETERS)
            .filter(|&k| changed[k])
            .map(|k| format!("p{}", k))
            .collect();
        let changed_refs: Vec<&str> = changed_names.iter().map(String::as_str).collect();

        let expected = table_with(&specs, &finals).compute_all(&[]).unwrap();

        let mut incremental = table_with(&specs, &before);
        let initial = incremental.compute_all(&[]).unwrap();
        for name in &changed_refs {
            let k: usize = name[1..].parse().unwrap();
            incremental.set_parameter(name, Value::Int(after[k])).unwrap();
        }
        let partial = incremental.compute_all(&changed_refs).unwrap();
        prop_assert_eq!(&partial, &expected);

        let affected = incremental.affected_columns(&changed_refs);
        for (name, value) in &partial {
            if !affected.contains(name) {
                prop_assert_eq!(value, &initial[name]);
            }
        }

        let mut updated = table_with(&specs, &before);
        updated.compute_all(&[]).unwrap();
        let via_update = updated
            .update_parameters(
                changed_names
                    .iter()
                    .map(|name| (name.clone(), Value::Int(after[name[1..].parse::<usize>().unwrap()]))),
            )
            .unwrap();
        prop_assert_eq!(via_update, expected);
    }
}
