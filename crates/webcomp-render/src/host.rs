/*
 * host.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Host platform boundary.
//!
//! The renderer never touches a concrete node tree. It creates nodes through
//! a [`Document`] and mutates them through [`HostNode`] handles, which follow
//! DOM semantics: handles are cheap to clone, compare by identity, and
//! inserting a node that already has a parent moves it.

use std::fmt;
use std::rc::Rc;

use crate::error::RenderResult;
use crate::value::Value;

/// Namespace used for `xlink:`-prefixed attributes.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Callback registered on a node for one event type.
pub type EventListener = Rc<dyn Fn(&Value) -> RenderResult<()>>;

/// Node factory of a host platform.
pub trait Document {
    type Node: HostNode;

    fn create_element(&self, name: &str, namespace: Option<&str>) -> Self::Node;

    fn create_text(&self, value: &str) -> Self::Node;
}

/// Handle to a live visual node.
pub trait HostNode: Clone + PartialEq + fmt::Debug + 'static {
    fn parent(&self) -> Option<Self>;

    fn child_at(&self, index: usize) -> Option<Self>;

    fn append_child(&self, child: &Self);

    fn insert_before(&self, child: &Self, reference: &Self);

    fn remove_child(&self, child: &Self);

    /// Text of the node (concatenated descendant text for elements).
    fn text_content(&self) -> String;

    /// Replace the node's content with a single text value.
    fn set_text_content(&self, value: &str);

    fn set_attribute(&self, name: &str, value: &Value);

    fn set_attribute_ns(&self, _namespace: &str, name: &str, value: &Value) {
        self.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str);

    fn has_attribute(&self, name: &str) -> bool;

    fn get_attribute(&self, name: &str) -> Option<Value>;

    /// Whether the node type has a live property with this name.
    fn has_property(&self, _name: &str) -> bool {
        false
    }

    fn set_property(&self, _name: &str, _value: Value) {}

    /// Register the listener for `event`, replacing any previous one.
    fn add_event_listener(&self, event: &str, listener: EventListener);

    fn remove_event_listener(&self, event: &str);

    /// Named content slot of a component-like node (`None` is the default slot).
    fn slot(&self, _name: Option<&str>) -> Option<Self> {
        None
    }

    /// Tell a component-like node which of its content slots received content.
    fn render_slots(&self, _fill: &SlotFill) {}
}

/// Insert `child` into `parent` at `position`, moving it if needed.
///
/// Returns `false` when the child already sits at that position.
pub fn insert_child_at<N: HostNode>(parent: &N, child: &N, position: usize) -> bool {
    match parent.child_at(position) {
        Some(reference) if reference == *child => false,
        Some(reference) => {
            parent.insert_before(child, &reference);
            true
        }
        None => {
            parent.append_child(child);
            true
        }
    }
}

/// Remove `node` from its parent, if it has one.
pub fn detach<N: HostNode>(node: &N) {
    if let Some(parent) = node.parent() {
        parent.remove_child(node);
    }
}

/// Insertion counters per content slot of one open element.
///
/// The count for a slot is the position the next child goes to; a non-zero
/// count means the slot received content during the pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFill {
    counts: Vec<(Option<String>, usize)>,
}

impl SlotFill {
    pub fn position(&self, name: Option<&str>) -> usize {
        self.counts
            .iter()
            .find(|(slot, _)| slot.as_deref() == name)
            .map_or(0, |(_, count)| *count)
    }

    /// Set the counter for a slot.
    pub fn set(&mut self, name: Option<&str>, count: usize) {
        match self.counts.iter_mut().find(|(slot, _)| slot.as_deref() == name) {
            Some(entry) => entry.1 = count,
            None => self.counts.push((name.map(str::to_string), count)),
        }
    }

    /// Reserve the next position in a slot.
    pub fn advance(&mut self, name: Option<&str>) -> usize {
        let position = self.position(name);
        self.set(name, position + 1);
        position
    }

    pub fn is_filled(&self, name: Option<&str>) -> bool {
        self.position(name) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, usize)> {
        self.counts.iter().map(|(slot, count)| (slot.as_deref(), *count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_fill_counters() {
        let mut fill = SlotFill::default();
        assert!(!fill.is_filled(None));

        assert_eq!(fill.advance(Some("header")), 0);
        assert_eq!(fill.advance(Some("header")), 1);
        fill.set(None, 1);

        assert!(fill.is_filled(Some("header")));
        assert!(fill.is_filled(None));
        assert!(!fill.is_filled(Some("footer")));
        assert_eq!(
            fill.iter().collect::<Vec<_>>(),
            vec![(Some("header"), 2), (None, 1)]
        );
    }
}
