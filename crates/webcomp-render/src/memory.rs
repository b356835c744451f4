/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! In-memory host platform.
//!
//! A small reference-counted node tree implementing [`Document`] and
//! [`HostNode`]. It backs headless rendering and the test suite: every
//! mutation the renderer performs is counted in [`MutationStats`], and
//! [`MemoryNode::to_markup`] serializes a subtree for assertions.
//!
//! Tags registered with [`MemoryDocument::register_component`] behave like
//! component hosts: asking them for a content slot lazily creates a
//! detached `slot` element (the component's own template places it), and
//! [`HostNode::render_slots`] toggles a `slotted` attribute on those slot
//! elements.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::error::RenderResult;
use crate::host::{Document, EventListener, HostNode, SlotFill};
use crate::value::Value;

/// Counts of host mutations, for idempotence and minimality assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub elements_created: usize,
    pub texts_created: usize,
    pub insertions: usize,
    pub removals: usize,
    pub attribute_writes: usize,
    pub attribute_removals: usize,
    pub property_writes: usize,
    pub text_writes: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
}

#[derive(Debug, Default)]
struct DocumentState {
    stats: RefCell<MutationStats>,
    components: RefCell<FxHashSet<String>>,
    properties: RefCell<FxHashSet<String>>,
}

impl DocumentState {
    fn record(&self, f: impl FnOnce(&mut MutationStats)) {
        f(&mut self.stats.borrow_mut());
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    state: Rc<DocumentState>,
}

impl MemoryDocument {
    /// Create a document whose elements know the common inline event
    /// properties (`onclick`, `oninput`, `onchange`, `onsubmit`).
    pub fn new() -> Self {
        let doc = Self {
            state: Rc::default(),
        };
        for name in ["onclick", "oninput", "onchange", "onsubmit"] {
            doc.register_property(name);
        }
        doc
    }

    /// Make elements with this tag behave like component hosts.
    pub fn register_component(&self, tag: &str) {
        self.state.components.borrow_mut().insert(tag.to_string());
    }

    /// Declare a live property every element has.
    pub fn register_property(&self, name: &str) {
        self.state.properties.borrow_mut().insert(name.to_string());
    }

    pub fn stats(&self) -> MutationStats {
        *self.state.stats.borrow()
    }

    pub fn reset_stats(&self) {
        *self.state.stats.borrow_mut() = MutationStats::default();
    }

    fn node(&self, kind: NodeKind) -> MemoryNode {
        MemoryNode(Rc::new(RefCell::new(NodeData {
            kind,
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: Weak::new(),
            slots: Vec::new(),
            document: Rc::clone(&self.state),
        })))
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    type Node = MemoryNode;

    fn create_element(&self, name: &str, namespace: Option<&str>) -> MemoryNode {
        self.state.record(|s| s.elements_created += 1);
        self.node(NodeKind::Element {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        })
    }

    fn create_text(&self, value: &str) -> MemoryNode {
        self.state.record(|s| s.texts_created += 1);
        self.node(NodeKind::Text(value.to_string()))
    }
}

#[derive(Debug)]
enum NodeKind {
    Element {
        name: String,
        namespace: Option<String>,
    },
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    attributes: IndexMap<String, Value>,
    properties: IndexMap<String, Value>,
    listeners: IndexMap<String, EventListener>,
    children: Vec<MemoryNode>,
    parent: Weak<RefCell<NodeData>>,
    slots: Vec<(Option<String>, MemoryNode)>,
    document: Rc<DocumentState>,
}

/// Handle to a node of a [`MemoryDocument`].
#[derive(Clone)]
pub struct MemoryNode(Rc<RefCell<NodeData>>);

impl PartialEq for MemoryNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.borrow().kind {
            NodeKind::Element { name, .. } => write!(f, "<{name}>"),
            NodeKind::Text(text) => write!(f, "#text({text:?})"),
        }
    }
}

impl MemoryNode {
    fn record(&self, f: impl FnOnce(&mut MutationStats)) {
        let document = Rc::clone(&self.0.borrow().document);
        document.record(f);
    }

    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { name, .. } => Some(name.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { namespace, .. } => namespace.clone(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn children(&self) -> Vec<MemoryNode> {
        self.0.borrow().children.clone()
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.borrow().properties.get(name).cloned()
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.0.borrow().listeners.contains_key(event)
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    fn is_component(&self) -> bool {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Element { name, .. } => data.document.components.borrow().contains(name),
            NodeKind::Text(_) => false,
        }
    }

    /// Fire `event_type` at this node. Returns whether a listener ran.
    pub fn dispatch(&self, event_type: &str, event: &Value) -> RenderResult<bool> {
        let listener = self.0.borrow().listeners.get(event_type).cloned();
        match listener {
            Some(listener) => {
                listener(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serialize this node and its subtree.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    /// Serialize only the children of this node.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_markup(&mut out);
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Element { name, .. } => {
                out.push('<');
                out.push_str(name);
                for (attr, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    out.push_str(&escape(&value.to_text(), true));
                    out.push('"');
                }
                out.push('>');
                for child in &data.children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn detach_from_parent(&self) {
        if let Some(parent) = self.parent() {
            parent
                .0
                .borrow_mut()
                .children
                .retain(|child| child != self);
            self.0.borrow_mut().parent = Weak::new();
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl HostNode for MemoryNode {
    fn parent(&self) -> Option<Self> {
        self.0.borrow().parent.upgrade().map(MemoryNode)
    }

    fn child_at(&self, index: usize) -> Option<Self> {
        self.0.borrow().children.get(index).cloned()
    }

    fn append_child(&self, child: &Self) {
        child.detach_from_parent();
        self.0.borrow_mut().children.push(child.clone());
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.record(|s| s.insertions += 1);
    }

    fn insert_before(&self, child: &Self, reference: &Self) {
        child.detach_from_parent();
        let position = self
            .0
            .borrow()
            .children
            .iter()
            .position(|c| c == reference);
        match position {
            Some(position) => self.0.borrow_mut().children.insert(position, child.clone()),
            None => self.0.borrow_mut().children.push(child.clone()),
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.record(|s| s.insertions += 1);
    }

    fn remove_child(&self, child: &Self) {
        if child.parent().as_ref() == Some(self) {
            child.detach_from_parent();
            self.record(|s| s.removals += 1);
        }
    }

    fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => data.children.iter().map(|c| c.text_content()).collect(),
        }
    }

    fn set_text_content(&self, value: &str) {
        self.record(|s| s.text_writes += 1);
        let is_text = matches!(self.0.borrow().kind, NodeKind::Text(_));
        if is_text {
            self.0.borrow_mut().kind = NodeKind::Text(value.to_string());
            return;
        }

        for child in self.children() {
            child.0.borrow_mut().parent = Weak::new();
        }
        let text = {
            let data = self.0.borrow();
            MemoryDocument {
                state: Rc::clone(&data.document),
            }
            .node(NodeKind::Text(value.to_string()))
        };
        let mut data = self.0.borrow_mut();
        data.children.clear();
        if !value.is_empty() {
            text.0.borrow_mut().parent = Rc::downgrade(&self.0);
            data.children.push(text);
        }
    }

    fn set_attribute(&self, name: &str, value: &Value) {
        self.record(|s| s.attribute_writes += 1);
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.clone());
    }

    fn remove_attribute(&self, name: &str) {
        let removed = self.0.borrow_mut().attributes.shift_remove(name).is_some();
        if removed {
            self.record(|s| s.attribute_removals += 1);
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.0.borrow().attributes.contains_key(name)
    }

    fn get_attribute(&self, name: &str) -> Option<Value> {
        self.0.borrow().attributes.get(name).cloned()
    }

    fn has_property(&self, name: &str) -> bool {
        self.0.borrow().document.properties.borrow().contains(name)
    }

    fn set_property(&self, name: &str, value: Value) {
        self.record(|s| s.property_writes += 1);
        self.0
            .borrow_mut()
            .properties
            .insert(name.to_string(), value);
    }

    fn add_event_listener(&self, event: &str, listener: EventListener) {
        self.record(|s| s.listeners_added += 1);
        self.0
            .borrow_mut()
            .listeners
            .insert(event.to_string(), listener);
    }

    fn remove_event_listener(&self, event: &str) {
        let removed = self.0.borrow_mut().listeners.shift_remove(event).is_some();
        if removed {
            self.record(|s| s.listeners_removed += 1);
        }
    }

    fn slot(&self, name: Option<&str>) -> Option<Self> {
        if !self.is_component() {
            return None;
        }

        let existing = self
            .0
            .borrow()
            .slots
            .iter()
            .find(|(slot, _)| slot.as_deref() == name)
            .map(|(_, node)| node.clone());
        if existing.is_some() {
            return existing;
        }

        let document = MemoryDocument {
            state: Rc::clone(&self.0.borrow().document),
        };
        let slot = document.create_element("slot", None);
        if let Some(name) = name {
            slot.set_attribute("name", &Value::from(name));
        }
        self.0
            .borrow_mut()
            .slots
            .push((name.map(str::to_string), slot.clone()));
        Some(slot)
    }

    fn render_slots(&self, fill: &SlotFill) {
        let slots = self.0.borrow().slots.clone();
        for (name, slot) in slots {
            let filled = fill.is_filled(name.as_deref());
            if filled && !slot.has_attribute("slotted") {
                slot.set_attribute("slotted", &Value::from(""));
            } else if !filled {
                slot.remove_attribute("slotted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::insert_child_at;
    use std::cell::Cell;

    #[test]
    fn test_insert_moves_node() {
        let doc = MemoryDocument::new();
        let a = doc.create_element("a", None);
        let b = doc.create_element("b", None);
        let x = doc.create_element("x", None);

        a.append_child(&x);
        b.append_child(&x);

        assert!(a.children().is_empty());
        assert_eq!(x.parent(), Some(b.clone()));
        assert_eq!(b.to_markup(), "<b><x></x></b>");
    }

    #[test]
    fn test_insert_child_at_reorders() {
        let doc = MemoryDocument::new();
        let root = doc.create_element("ul", None);
        let items: Vec<_> = ["1", "2", "3"]
            .iter()
            .map(|id| {
                let li = doc.create_element("li", None);
                li.set_attribute("id", &Value::from(*id));
                root.append_child(&li);
                li
            })
            .collect();

        assert!(!insert_child_at(&root, &items[0], 0));
        assert!(insert_child_at(&root, &items[2], 0));
        assert_eq!(
            root.inner_markup(),
            r#"<li id="3"></li><li id="1"></li><li id="2"></li>"#
        );
    }

    #[test]
    fn test_text_content() {
        let doc = MemoryDocument::new();
        let p = doc.create_element("p", None);
        p.set_text_content("a < b");
        assert_eq!(p.text_content(), "a < b");
        assert_eq!(p.to_markup(), "<p>a &lt; b</p>");

        p.set_text_content("");
        assert!(p.children().is_empty());
    }

    #[test]
    fn test_component_slots_are_lazy() {
        let doc = MemoryDocument::new();
        doc.register_component("x-card");
        let card = doc.create_element("x-card", None);
        let div = doc.create_element("div", None);

        assert!(div.slot(None).is_none());
        let header = card.slot(Some("header")).unwrap();
        assert_eq!(card.slot(Some("header")), Some(header.clone()));
        assert_eq!(header.to_markup(), r#"<slot name="header"></slot>"#);
        assert_eq!(header.parent(), None);

        let mut fill = SlotFill::default();
        fill.set(Some("header"), 1);
        card.render_slots(&fill);
        assert!(header.has_attribute("slotted"));

        card.render_slots(&SlotFill::default());
        assert!(!header.has_attribute("slotted"));
    }

    #[test]
    fn test_dispatch_and_stats() {
        let doc = MemoryDocument::new();
        let button = doc.create_element("button", None);
        let hits = Rc::new(Cell::new(0));
        let hits_in = Rc::clone(&hits);

        button.add_event_listener(
            "click",
            Rc::new(move |_: &Value| {
                hits_in.set(hits_in.get() + 1);
                Ok(())
            }),
        );
        assert!(button.dispatch("click", &Value::Null).unwrap());
        assert!(!button.dispatch("keyup", &Value::Null).unwrap());
        button.remove_event_listener("click");
        button.remove_event_listener("click");

        assert_eq!(hits.get(), 1);
        let stats = doc.stats();
        assert_eq!(stats.elements_created, 1);
        assert_eq!(stats.listeners_added, 1);
        assert_eq!(stats.listeners_removed, 1);
    }
}
