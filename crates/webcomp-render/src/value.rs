/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Dynamic values flowing through template execution.
//!
//! Templates read data through [`Value`], which mirrors the value shapes a
//! scripted host hands to a component: scalars, sequences, keyed mappings,
//! sets, host objects and callables. Containers are reference counted so a
//! value can be cloned into the Value Context stack without copying data.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::collection::Collection;
use crate::error::RenderResult;

/// Insertion-ordered string-keyed mapping used for [`Value::Map`].
pub type ValueMap = IndexMap<String, Value>;

/// A value that can be used in template evaluation.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// An absent value.
    #[default]
    Null,

    /// A boolean value.
    Bool(bool),

    /// A numeric value.
    Number(f64),

    /// A string value.
    String(String),

    /// An ordered sequence.
    List(Rc<Vec<Value>>),

    /// A keyed mapping (also used for plain keyed objects).
    Map(Rc<ValueMap>),

    /// An insertion-ordered set of distinct values.
    Set(Rc<Vec<Value>>),

    /// A Multi-Value Container produced by filtering or wildcard access.
    Collection(Collection),

    /// A host object with its own key, attribute and method contracts.
    Object(Rc<dyn ValueObject>),

    /// A callable value, compared by identity.
    Function(Function),
}

/// Read contract for host objects stored in a [`Value::Object`].
pub trait ValueObject: fmt::Debug {
    /// Plain keyed access. Missing keys yield [`Value::Null`].
    fn get(&self, key: &str) -> Value;

    /// Own keys, used when a predicate iterates the object.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Attribute-read contract used by `@name` access tokens.
    ///
    /// Returning `None` means the object exposes no attribute contract and
    /// the access falls back to plain keyed access.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Invoke a named method. `None` means there is no such method.
    fn call(&self, _method: &str, _args: &[Value]) -> Option<RenderResult<Value>> {
        None
    }
}

/// A callable value.
///
/// Equality is identity: two `Function`s are equal only when they share
/// the same allocation, which is what event-handler reconciliation relies on.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&[Value]) -> RenderResult<Value>>);

impl Function {
    pub fn new(f: impl Fn(&[Value]) -> RenderResult<Value> + 'static) -> Self {
        Function(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> RenderResult<Value> {
        (self.0)(args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

impl Value {
    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Build a map value, keeping insertion order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build a set value. Later duplicates are dropped.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(Rc::new(members))
    }

    pub fn function(f: impl Fn(&[Value]) -> RenderResult<Value> + 'static) -> Self {
        Value::Function(Function::new(f))
    }

    pub fn object(obj: impl ValueObject + 'static) -> Self {
        Value::Object(Rc::new(obj))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is "truthy".
    ///
    /// Null, `false`, `0`, `NaN` and the empty string are falsy; every
    /// other value, including empty containers, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Collection(_) => "collection",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion with script semantics.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::List(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// String representation used for text output.
    ///
    /// - Null: ""
    /// - Numbers: integers print without a fractional part
    /// - Containers and objects: JSON text
    pub fn to_text(&self) -> String {
        match self {
            Value::Null | Value::Function(_) => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            _ => self.to_json().to_string(),
        }
    }

    /// Convert into a JSON value. Functions and non-finite numbers map to null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) | Value::Set(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Collection(c) => {
                serde_json::Value::Array(c.items().iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(obj) => serde_json::Value::Object(
                obj.keys()
                    .into_iter()
                    .map(|k| {
                        let v = obj.get(&k).to_json();
                        (k, v)
                    })
                    .collect(),
            ),
        }
    }
}

/// Format a number the way script output does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Collection(a), Value::Collection(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::map(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<Collection> for Value {
    fn from(c: Collection) -> Self {
        Value::Collection(c)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
