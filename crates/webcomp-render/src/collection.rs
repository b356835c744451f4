/*
 * collection.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Multi-Value Container.
//!
//! A [`Collection`] wraps zero, one or many resolved values so that filter
//! and wildcard chains compose regardless of arity. Callers never observe a
//! collection directly: [`Collection::value_of`] collapses it back into a
//! plain value once a chain is fully resolved.

use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    items: Rc<Vec<Value>>,
}

impl Collection {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Rc::new(items),
        }
    }

    /// Wrap any value.
    ///
    /// Lists contribute their elements, maps and sets their values, null
    /// contributes nothing, and any other value becomes a single element.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Collection(c) => c.clone(),
            Value::List(items) | Value::Set(items) => Self {
                items: Rc::clone(items),
            },
            Value::Map(map) => map.values().cloned().collect(),
            Value::Null => Self::default(),
            other => Self::new(vec![other.clone()]),
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Collapse into a plain value: nothing becomes null, one value becomes
    /// the bare value, several values become a list.
    pub fn value_of(&self) -> Value {
        match self.items.len() {
            0 => Value::Null,
            1 => self.items[0].clone(),
            _ => Value::List(Rc::clone(&self.items)),
        }
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_of_collapses_by_arity() {
        assert_eq!(Collection::default().value_of(), Value::Null);
        assert_eq!(
            Collection::new(vec![Value::from("a")]).value_of(),
            Value::from("a")
        );
        assert_eq!(
            Collection::new(vec![Value::from("a"), Value::from("b")]).value_of(),
            Value::list([Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_from_value() {
        let map = Value::map([("x", Value::from(1)), ("y", Value::from(2))]);
        assert_eq!(
            Collection::from_value(&map).items(),
            &[Value::from(1), Value::from(2)]
        );
        assert!(Collection::from_value(&Value::Null).is_empty());
        assert_eq!(Collection::from_value(&Value::from(7)).len(), 1);
    }

    #[test]
    fn test_single_element_list_collapses_to_element() {
        // A one-element list wrapped and collapsed yields the element itself
        let list = Value::list([Value::from("only")]);
        assert_eq!(Collection::from_value(&list).value_of(), Value::from("only"));
    }
}
