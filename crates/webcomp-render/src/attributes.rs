/*
 * attributes.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Attribute sets and their reconciliation against a live node.

use indexmap::IndexMap;

use crate::events::{EventBindings, EventOwner};
use crate::host::{HostNode, XLINK_NS};
use crate::value::Value;

/// Pending or applied attributes of one element, in template order.
pub type Attributes = IndexMap<String, Value>;

/// Build an attribute set.
pub fn attributes<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Attributes
where
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Add one class token to a class list.
///
/// The existing list is whitespace-normalized; the token is appended only
/// if it is not already present.
pub fn add_class(current: Option<&Value>, class: &str) -> String {
    let current = current.map(Value::to_text).unwrap_or_default();
    let mut tokens: Vec<&str> = current.split_whitespace().collect();
    let class = class.trim();
    if current.trim().is_empty() {
        return class.to_string();
    }
    if !class.is_empty() && !tokens.contains(&class) {
        tokens.push(class);
    }
    tokens.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeKind<'a> {
    /// `on-click`: bound through the node's event table.
    Event(&'a str),

    /// `onclick` where the node has such a live property.
    Property,

    Plain,
}

fn classify<'a, N: HostNode>(node: &N, name: &'a str, prefix: &str) -> AttributeKind<'a> {
    let Some(rest) = name.strip_prefix(prefix) else {
        return AttributeKind::Plain;
    };
    match rest.strip_prefix('-') {
        Some(event) if !event.is_empty() => AttributeKind::Event(event),
        _ if node.has_property(name) => AttributeKind::Property,
        _ => AttributeKind::Plain,
    }
}

/// Everything [`sync_attributes`] needs besides the two attribute sets.
pub struct SyncTarget<'a, N> {
    pub node: &'a N,
    pub events: &'a mut EventBindings,
    pub event_prefix: &'a str,
    pub owner: Option<&'a EventOwner>,
}

/// Apply the difference between `prev` and `attrs` to the node.
///
/// Only values that differ from the previously applied ones touch the node.
/// Keys that were applied before but are missing from `attrs` are treated
/// as null. Returns whether any plain attribute changed.
pub fn sync_attributes<N: HostNode>(
    target: SyncTarget<'_, N>,
    attrs: &Attributes,
    prev: &Attributes,
) -> bool {
    let SyncTarget {
        node,
        events,
        event_prefix,
        owner,
    } = target;
    let mut updated = false;

    let removed = prev
        .keys()
        .filter(|name| !attrs.contains_key(*name))
        .map(|name| (name, None));
    let current = attrs.iter().map(|(name, value)| (name, Some(value)));

    for (name, value) in current.chain(removed) {
        let kind = classify(node, name, event_prefix);
        let previous = prev.get(name);

        match value.filter(|v| !v.is_null()) {
            None => match kind {
                AttributeKind::Event(event) => {
                    events.set(node, event, &Value::Null, owner);
                }
                AttributeKind::Property => node.set_property(name, Value::Null),
                AttributeKind::Plain => {
                    if previous.is_some_and(|p| !p.is_null()) {
                        node.remove_attribute(name);
                        updated = true;
                    }
                }
            },
            Some(value) if previous != Some(value) => match kind {
                AttributeKind::Event(event) => {
                    events.set(node, event, value, owner);
                }
                AttributeKind::Property => node.set_property(name, value.clone()),
                AttributeKind::Plain => {
                    write_attribute(node, name, value);
                    updated = true;
                }
            },
            Some(_) => {}
        }
    }

    updated
}

fn write_attribute<N: HostNode>(node: &N, name: &str, value: &Value) {
    if name.starts_with("xlink:") {
        node.set_attribute_ns(XLINK_NS, name, value);
    } else {
        node.set_attribute(name, value);
    }
}
