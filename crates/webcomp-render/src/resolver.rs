/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Value Resolver.
//!
//! Generic read access over the shapes a [`Value`] can take. Compiled
//! templates describe an access path as a chain of [`Token`]s; each token is
//! resolved against the result of the previous one by [`get`].
//!
//! Access is null-propagating: resolving anything against null yields null.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::collection::Collection;
use crate::error::{RenderError, RenderResult};
use crate::scope::ValueScope;
use crate::value::Value;

/// A filter predicate evaluated with the candidate bound as the current value.
#[derive(Clone)]
pub struct Predicate(Rc<dyn Fn(&mut ValueScope) -> RenderResult<bool>>);

impl Predicate {
    pub fn new(f: impl Fn(&mut ValueScope) -> RenderResult<bool> + 'static) -> Self {
        Predicate(Rc::new(f))
    }

    pub fn test(&self, scope: &mut ValueScope) -> RenderResult<bool> {
        (self.0)(scope)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// One step of an access path.
#[derive(Debug, Clone)]
pub enum Token {
    /// `self`: the current value itself (first position only).
    SelfRef,

    /// `$name`: a template variable (first position only).
    Variable(String),

    /// `@name`: an attribute read through the value's attribute contract.
    Attribute(String),

    /// Plain keyed or property access.
    Key(String),

    /// Positional access.
    Index(usize),

    /// `*`: force the result into container form.
    Wildcard,

    /// Invoke a method by name with literal arguments.
    Call(String, Vec<Value>),

    /// Keep only the entries for which the predicate holds.
    Predicate(Predicate),
}

impl Token {
    pub fn call(method: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Token::Call(method.into(), args.into_iter().collect())
    }

    pub fn predicate(f: impl Fn(&mut ValueScope) -> RenderResult<bool> + 'static) -> Self {
        Token::Predicate(Predicate::new(f))
    }

    /// The literal key this token stands for when used as plain access.
    fn as_key(&self) -> Option<Cow<'_, str>> {
        match self {
            Token::SelfRef => Some(Cow::Borrowed("self")),
            Token::Variable(name) => Some(Cow::Owned(format!("${name}"))),
            Token::Attribute(name) => Some(Cow::Owned(format!("@{name}"))),
            Token::Key(key) => Some(Cow::Borrowed(key)),
            Token::Wildcard => Some(Cow::Borrowed("*")),
            _ => None,
        }
    }
}

impl From<&str> for Token {
    /// Parse a string token by its sigil.
    fn from(s: &str) -> Self {
        match s {
            "self" => Token::SelfRef,
            "*" => Token::Wildcard,
            _ => {
                if let Some(name) = s.strip_prefix('$') {
                    Token::Variable(name.to_string())
                } else if let Some(name) = s.strip_prefix('@') {
                    Token::Attribute(name.to_string())
                } else {
                    Token::Key(s.to_string())
                }
            }
        }
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::from(s.as_str())
    }
}

impl From<usize> for Token {
    fn from(index: usize) -> Self {
        Token::Index(index)
    }
}

impl From<Predicate> for Token {
    fn from(p: Predicate) -> Self {
        Token::Predicate(p)
    }
}

/// Callback that evaluates a predicate for one candidate entry.
///
/// Receives the predicate, the candidate value, its name (key, index or
/// set member) and its position in the iteration.
pub type PredicateCaller<'a> =
    dyn FnMut(&Predicate, &Value, &Value, usize) -> RenderResult<bool> + 'a;

/// Resolve one access token against `obj`.
pub fn get(obj: &Value, key: &Token, call: &mut PredicateCaller<'_>) -> RenderResult<Value> {
    if obj.is_null() {
        return Ok(Value::Null);
    }

    match key {
        Token::Predicate(predicate) => return filter(obj, predicate, call).map(Value::Collection),
        Token::Wildcard => {
            return Ok(match obj {
                Value::Collection(_) => obj.clone(),
                _ => Value::Collection(Collection::from_value(obj)),
            });
        }
        _ => {}
    }

    if let Value::Collection(c) = obj {
        if let Token::Index(index) = key {
            return Ok(c.get(*index).cloned().unwrap_or_default());
        }

        // Map the lookup over every element, staying in container form
        let mut items = Vec::new();
        for item in c.items() {
            let value = get(item, key, call)?;
            if !value.is_null() {
                items.push(value);
            }
        }
        return Ok(Value::Collection(Collection::new(items)));
    }

    match key {
        Token::Call(method, args) => invoke(obj, method, args),
        Token::Index(index) => Ok(index_of(obj, *index)),
        other => Ok(other
            .as_key()
            .map_or(Value::Null, |k| property(obj, &k))),
    }
}

/// Read `@name` from `obj`, preferring the value's attribute contract.
pub fn get_attribute(obj: &Value, name: &str, call: &mut PredicateCaller<'_>) -> RenderResult<Value> {
    if let Value::Object(object) = obj {
        if let Some(value) = object.attribute(name) {
            return Ok(value);
        }
    }
    get(obj, &Token::Attribute(name.to_string()), call)
}

/// Ordinary keyed or property access.
pub fn property(obj: &Value, key: &str) -> Value {
    match obj {
        Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
        Value::Object(object) => object.get(key),
        Value::List(items) => match key {
            "length" => Value::from(items.len()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        Value::Set(items) if key == "size" => Value::from(items.len()),
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

fn index_of(obj: &Value, index: usize) -> Value {
    match obj {
        Value::List(items) => items.get(index).cloned().unwrap_or_default(),
        Value::String(s) => s
            .chars()
            .nth(index)
            .map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => property(obj, &index.to_string()),
    }
}

fn invoke(obj: &Value, method: &str, args: &[Value]) -> RenderResult<Value> {
    let not_callable = || RenderError::NotCallable {
        method: method.to_string(),
        type_name: obj.type_name().to_string(),
    };

    match obj {
        Value::Object(object) => object.call(method, args).ok_or_else(not_callable)?,
        Value::Map(map) => match map.get(method) {
            Some(Value::Function(f)) => f.call(args),
            _ => Err(not_callable()),
        },
        _ => Err(not_callable()),
    }
}

/// Filter `obj` by `predicate`. Always yields a container, even for zero or
/// one match.
fn filter(
    obj: &Value,
    predicate: &Predicate,
    call: &mut PredicateCaller<'_>,
) -> RenderResult<Collection> {
    let mut result = Vec::new();

    match obj {
        Value::Collection(c) => {
            for (position, value) in c.items().iter().enumerate() {
                if call(predicate, value, &Value::from(position), position)? {
                    result.push(value.clone());
                }
            }
        }
        Value::List(items) => {
            for (position, value) in items.iter().enumerate() {
                if call(predicate, value, &Value::from(position), position)? {
                    result.push(value.clone());
                }
            }
        }
        Value::Set(items) => {
            for (position, value) in items.iter().enumerate() {
                if call(predicate, value, value, position)? {
                    result.push(value.clone());
                }
            }
        }
        Value::Map(map) => {
            for (position, (name, value)) in map.iter().enumerate() {
                if call(predicate, value, &Value::String(name.clone()), position)? {
                    result.push(value.clone());
                }
            }
        }
        Value::Object(object) => {
            for (position, name) in object.keys().into_iter().enumerate() {
                let value = object.get(&name);
                if call(predicate, &value, &Value::String(name), position)? {
                    result.push(value);
                }
            }
        }
        scalar => {
            // Non-iterable value: test it on its own
            if call(predicate, scalar, &Value::Null, 0)? {
                result.push(scalar.clone());
            }
        }
    }

    Ok(Collection::new(result))
}
