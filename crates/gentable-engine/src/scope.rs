//! Name resolution for formula evaluation.
//!
//! A [`Scope`] is the only way a formula can see data. Scopes compose
//! without copying: [`Layered`] stacks several scopes (first match wins) and
//! [`Bind`] shadows a single name, which is how a column's conditions see
//! the column's own current value.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::value::Value;

pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Scope for HashMap<String, Value, S> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<T: Scope + ?Sized> Scope for &T {
    fn lookup(&self, name: &str) -> Option<&Value> {
        (**self).lookup(name)
    }
}

/// A scope with no names at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<&Value> {
        None
    }
}

/// Several scopes searched in order.
pub struct Layered<'a> {
    layers: Vec<&'a dyn Scope>,
}

impl<'a> Layered<'a> {
    /// `layers[0]` has the highest precedence.
    pub fn new(layers: Vec<&'a dyn Scope>) -> Self {
        Layered { layers }
    }
}

impl Scope for Layered<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.layers.iter().find_map(|layer| layer.lookup(name))
    }
}

/// `parent` with one name bound (or rebound) to `value`.
pub struct Bind<'a> {
    parent: &'a dyn Scope,
    name: &'a str,
    value: &'a Value,
}

impl<'a> Bind<'a> {
    pub fn new(parent: &'a dyn Scope, name: &'a str, value: &'a Value) -> Self {
        Bind {
            parent,
            name,
            value,
        }
    }
}

impl Scope for Bind<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        if name == self.name {
            Some(self.value)
        } else {
            self.parent.lookup(name)
        }
    }
}
