//! Column dependency graph.
//!
//! Edges come only from declared dependencies; names that are not columns
//! (parameters, reference series) carry no edge, and neither does a column
//! naming itself, which its conditions may read. Ordering is a depth-first
//! post-order started from each column in insertion order, so independent
//! columns keep their insertion order and the result is reproducible.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TableError};

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// In-graph dependencies of each node, in declared order.
    edges: Vec<Vec<usize>>,
    /// Reverse of `edges`.
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build from `(name, declared dependencies)` pairs in insertion order.
    pub fn new<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let nodes: Vec<(&str, &[String])> = nodes.into_iter().collect();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (*name, i))
            .collect();

        let edges: Vec<Vec<usize>> = nodes
            .iter()
            .enumerate()
            .map(|(node, (_, deps))| {
                deps.iter()
                    .filter_map(|d| index.get(d.as_str()).copied())
                    .filter(|&dep| dep != node)
                    .collect()
            })
            .collect();

        let mut dependents = vec![Vec::new(); nodes.len()];
        for (node, deps) in edges.iter().enumerate() {
            for &dep in deps {
                if !dependents[dep].contains(&node) {
                    dependents[dep].push(node);
                }
            }
        }

        DependencyGraph {
            names: nodes.iter().map(|(name, _)| name.to_string()).collect(),
            edges,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Every node reachable from `start` through dependents, excluding the
    /// start nodes themselves unless they are reached again.
    pub fn transitive_dependents(&self, start: impl IntoIterator<Item = usize>) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack: Vec<usize> = start.into_iter().collect();
        while let Some(node) = stack.pop() {
            for &dependent in &self.dependents[node] {
                if seen.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
        seen
    }

    /// Post-order DFS over declared dependencies.
    ///
    /// Fails with [`TableError::CircularDependency`] naming the cycle, e.g.
    /// `a -> b -> a`.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let mut order = Vec::with_capacity(self.len());
        let mut done = vec![false; self.len()];
        let mut visiting = HashSet::new();
        let mut path = Vec::new();

        for start in 0..self.len() {
            if !done[start] {
                self.visit(start, &mut done, &mut visiting, &mut path, &mut order)?;
            }
        }
        Ok(order)
    }

    fn visit(
        &self,
        node: usize,
        done: &mut [bool],
        visiting: &mut HashSet<usize>,
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        if done[node] {
            return Ok(());
        }
        if visiting.contains(&node) {
            let start = path.iter().position(|&n| n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&n| self.names[n].clone())
                .collect();
            cycle.push(self.names[node].clone());
            return Err(TableError::CircularDependency { path: cycle });
        }

        visiting.insert(node);
        path.push(node);
        for &dep in &self.edges[node] {
            self.visit(dep, done, visiting, path, order)?;
        }
        path.pop();
        visiting.remove(&node);

        done[node] = true;
        order.push(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[(&str, &[&str])]) -> (Vec<String>, DependencyGraph) {
        let owned: Vec<(String, Vec<String>)> = nodes
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect();
        let g = DependencyGraph::new(owned.iter().map(|(n, d)| (n.as_str(), d.as_slice())));
        (owned.into_iter().map(|(n, _)| n).collect(), g)
    }

    fn order_names(names: &[String], g: &DependencyGraph) -> Vec<String> {
        g.topological_order()
            .unwrap()
            .into_iter()
            .map(|i| names[i].clone())
            .collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let (names, g) = graph(&[("c", &["b", "parameter_x"]), ("b", &["a"]), ("a", &[])]);
        assert_eq!(order_names(&names, &g), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_independent_columns_keep_insertion_order() {
        let (names, g) = graph(&[("z", &[]), ("y", &[]), ("x", &["z"])]);
        assert_eq!(order_names(&names, &g), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_cycle_reports_path() {
        let (_, g) = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        match g.topological_order() {
            Err(TableError::CircularDependency { path }) => {
                assert_eq!(path, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_not_a_cycle() {
        let (names, g) = graph(&[("b", &["b", "a"]), ("a", &[])]);
        assert_eq!(order_names(&names, &g), vec!["a", "b"]);
        assert!(g.transitive_dependents([0]).is_empty());
    }

    #[test]
    fn test_transitive_dependents() {
        let (_, g) = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]);
        let reached = g.transitive_dependents([0]);
        assert_eq!(reached, HashSet::from([1, 2]));
        assert!(g.transitive_dependents([3]).is_empty());
    }
}
