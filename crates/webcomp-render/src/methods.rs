/*
 * methods.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Default top-level methods available to access paths.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::RenderResult;
use crate::scope::{Method, ValueFrame};
use crate::value::Value;

/// Build the default method table.
pub fn defaults() -> FxHashMap<String, Method> {
    let mut table: FxHashMap<String, Method> = FxHashMap::default();

    let mut add = |name: &str, f: fn(&ValueFrame, &[Value]) -> RenderResult<Value>| {
        table.insert(name.to_string(), Rc::new(f));
    };

    add("name", |frame, _| Ok(frame.name.clone()));
    add("position", |frame, _| Ok(Value::from(frame.position)));
    add("count", |_, args| Ok(Value::from(count(arg(args, 0)))));
    add("contains", |_, args| {
        Ok(Value::Bool(contains(arg(args, 0), arg(args, 1))))
    });
    add("text", |_, args| Ok(Value::String(arg(args, 0).to_text())));
    add("normalizeSpace", |_, args| {
        Ok(Value::String(normalize_space(&arg(args, 0).to_text())))
    });
    add("min", |_, args| {
        Ok(Value::Number(numbers(args).fold(f64::INFINITY, nan_min)))
    });
    add("max", |_, args| {
        Ok(Value::Number(numbers(args).fold(f64::NEG_INFINITY, nan_max)))
    });
    add("round", |_, args| Ok(Value::Number(round(first_number(args)))));
    add("floor", |_, args| Ok(Value::Number(first_number(args).floor())));
    add("ceil", |_, args| Ok(Value::Number(first_number(args).ceil())));

    table
}

fn arg(args: &[Value], index: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    args.get(index).unwrap_or(NULL)
}

fn numbers(args: &[Value]) -> impl Iterator<Item = f64> + '_ {
    args.iter().map(Value::to_number)
}

fn first_number(args: &[Value]) -> f64 {
    args.first().map_or(f64::NAN, Value::to_number)
}

/// Element count: 0 for null, the size of a container, the number of keys
/// of a host object, 1 for anything else.
pub fn count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::List(items) | Value::Set(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Object(object) => object.keys().len(),
        Value::Collection(c) => c.len(),
        _ => 1,
    }
}

/// Containment check: membership for sequences and sets, key presence for
/// maps, substring search for strings, equality for anything else.
pub fn contains(collection: &Value, value: &Value) -> bool {
    match collection {
        Value::Null => false,
        Value::List(items) | Value::Set(items) => items.contains(value),
        Value::Collection(c) => c.items().contains(value),
        Value::Map(map) => value.as_str().is_some_and(|key| map.contains_key(key)),
        Value::String(s) if !value.is_null() => s.contains(value.to_text().as_str()),
        other => other == value,
    }
}

/// Trim and collapse every whitespace run into a single space.
pub fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Round half up, the way script `Math.round` does (`-2.5` rounds to `-2`).
pub fn round(n: f64) -> f64 {
    (n + 0.5).floor()
}

// min/max poison on NaN, unlike f64::min/f64::max

fn nan_min(acc: f64, n: f64) -> f64 {
    if acc.is_nan() || n.is_nan() {
        f64::NAN
    } else {
        acc.min(n)
    }
}

fn nan_max(acc: f64, n: f64) -> f64 {
    if acc.is_nan() || n.is_nan() {
        f64::NAN
    } else {
        acc.max(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        let table = defaults();
        let frame = ValueFrame {
            value: Value::Null,
            name: Value::from("key"),
            position: 3,
        };
        table[name](&frame, args).unwrap()
    }

    #[test]
    fn test_context_methods() {
        assert_eq!(call("name", &[]), Value::from("key"));
        assert_eq!(call("position", &[]), Value::from(3));
    }

    #[test]
    fn test_count() {
        assert_eq!(call("count", &[Value::Null]), Value::from(0));
        assert_eq!(call("count", &[]), Value::from(0));
        assert_eq!(call("count", &[Value::list([Value::Null, Value::Null])]), Value::from(2));
        assert_eq!(call("count", &[Value::map([("a", Value::from(1))])]), Value::from(1));
        assert_eq!(call("count", &[Value::from("scalar")]), Value::from(1));
    }

    #[derive(Debug)]
    struct Point;

    impl crate::value::ValueObject for Point {
        fn get(&self, key: &str) -> Value {
            match key {
                "x" => Value::from(1),
                "y" => Value::from(2),
                _ => Value::Null,
            }
        }

        fn keys(&self) -> Vec<String> {
            vec!["x".to_string(), "y".to_string()]
        }
    }

    #[test]
    fn test_count_host_object_keys() {
        assert_eq!(call("count", &[Value::object(Point)]), Value::from(2));
    }

    #[test]
    fn test_contains() {
        let list = Value::list([Value::from("a"), Value::from("b")]);
        assert_eq!(call("contains", &[list.clone(), Value::from("b")]), Value::Bool(true));
        assert_eq!(call("contains", &[list, Value::from("z")]), Value::Bool(false));
        assert_eq!(
            call("contains", &[Value::from("hello"), Value::from("ell")]),
            Value::Bool(true)
        );
        assert_eq!(
            call("contains", &[Value::map([("k", Value::Null)]), Value::from("k")]),
            Value::Bool(true)
        );
        assert_eq!(call("contains", &[Value::Null, Value::Null]), Value::Bool(false));
        assert_eq!(call("contains", &[Value::from(4), Value::from(4)]), Value::Bool(true));
    }

    #[test]
    fn test_text_methods() {
        assert_eq!(call("text", &[Value::Null]), Value::from(""));
        assert_eq!(call("text", &[Value::list([Value::from(1)])]), Value::from("[1]"));
        assert_eq!(
            call("normalizeSpace", &[Value::from("  a \n\t b  c ")]),
            Value::from("a b c")
        );
    }

    #[test]
    fn test_numeric_methods() {
        let args = [Value::from(3), Value::from("1"), Value::from(2.5)];
        assert_eq!(call("min", &args), Value::from(1));
        assert_eq!(call("max", &args), Value::from(3));
        assert_eq!(call("round", &[Value::from(2.5)]), Value::from(3));
        assert_eq!(call("round", &[Value::from(-2.5)]), Value::from(-2));
        assert_eq!(call("floor", &[Value::from(-0.5)]), Value::from(-1));
        assert_eq!(call("ceil", &[Value::from(0.2)]), Value::from(1));
        assert!(call("max", &[Value::from("x")]).to_number().is_nan());
    }
}
