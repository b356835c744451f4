/*
 * node.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render Node Containers and cache payloads.

use crate::attributes::{Attributes, SyncTarget, sync_attributes};
use crate::cache::{Dispose, Nested, RenderCache};
use crate::events::{EventBindings, EventOwner};
use crate::host::{HostNode, SlotFill, detach};

/// Ownership wrapper around one rendered element.
///
/// Remembers what was last applied to the node (attributes, text, slot fill)
/// so the next pass can skip unchanged writes, and owns the node's event
/// bindings.
#[derive(Debug)]
pub struct RenderNode<N: HostNode> {
    node: Option<N>,

    /// Created by the renderer. Borrowed nodes (the render root, content
    /// slots of the root) belong to someone else.
    owned: bool,

    /// Inserted into a parent by the renderer.
    attached: bool,

    allow_slots: bool,
    attrs: Attributes,
    text: Option<String>,
    slot_fill: Option<SlotFill>,
    events: EventBindings,
}

impl<N: HostNode> RenderNode<N> {
    /// Wrap a freshly created element.
    pub fn new(node: N, allow_slots: bool) -> Self {
        Self {
            node: Some(node),
            owned: true,
            attached: false,
            allow_slots,
            attrs: Attributes::new(),
            text: None,
            slot_fill: None,
            events: EventBindings::default(),
        }
    }

    /// Wrap a node this container does not own.
    pub fn borrowed(node: N) -> Self {
        Self {
            owned: false,
            ..Self::new(node, false)
        }
    }

    pub fn node(&self) -> Option<&N> {
        self.node.as_ref()
    }

    /// Record that the renderer placed the node into a parent.
    pub fn set_attached(&mut self) {
        self.attached = true;
    }

    pub fn allow_slots(&self) -> bool {
        self.allow_slots
    }

    /// Content slot of the wrapped node, when slot placement is allowed.
    pub fn slot(&self, name: Option<&str>) -> Option<N> {
        if !self.allow_slots {
            return None;
        }
        self.node.as_ref().and_then(|node| node.slot(name))
    }

    /// Set the node's text. Compares against the live text, which may have
    /// been edited outside the renderer.
    pub fn set_text(&mut self, value: &str) -> bool {
        let Some(node) = &self.node else {
            return false;
        };
        self.text = Some(value.to_string());
        if node.text_content() != value {
            node.set_text_content(value);
            return true;
        }
        false
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Reconcile the node against `attrs` and remember them as applied.
    ///
    /// Returns whether any plain attribute changed.
    pub fn sync(&mut self, attrs: Attributes, event_prefix: &str, owner: Option<&EventOwner>) -> bool {
        let Some(node) = &self.node else {
            return false;
        };
        let mut updated = false;
        if attrs != self.attrs {
            let target = SyncTarget {
                node,
                events: &mut self.events,
                event_prefix,
                owner,
            };
            updated = sync_attributes(target, &attrs, &self.attrs);
        }
        self.attrs = attrs;
        updated
    }

    /// Whether `fill` differs from the fill propagated last time.
    pub fn slot_fill_changed(&self, fill: &SlotFill) -> bool {
        self.slot_fill.as_ref().is_some_and(|last| last != fill)
    }

    /// Report which content slots received content.
    pub fn render_slots(&mut self, fill: &SlotFill) {
        if let Some(node) = &self.node {
            node.render_slots(fill);
        }
        self.slot_fill = Some(fill.clone());
    }

    pub fn events(&self) -> &EventBindings {
        &self.events
    }

    /// Release the node: listeners are removed, and a node the renderer
    /// created or placed is detached from its parent. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(node) = self.node.take() {
            self.events.clear(&node);
            if self.owned || self.attached {
                detach(&node);
            }
            tracing::trace!(node = ?node, "disposed node");
        }
        self.attrs.clear();
        self.text = None;
        self.slot_fill = None;
        self.attached = false;
    }
}

/// Payload of one cache slot.
#[derive(Debug)]
pub enum CacheEntry<N: HostNode> {
    Element(RenderNode<N>),
    Text(N),
    Nested(RenderCache<CacheEntry<N>>),
}

impl<N: HostNode> CacheEntry<N> {
    /// The host node behind an element or text entry.
    pub fn node(&self) -> Option<&N> {
        match self {
            CacheEntry::Element(element) => element.node(),
            CacheEntry::Text(text) => Some(text),
            CacheEntry::Nested(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut RenderNode<N>> {
        match self {
            CacheEntry::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Update the text carried by this entry. Returns whether the node changed.
    pub fn set_text(&mut self, value: &str) -> bool {
        match self {
            CacheEntry::Element(element) => element.set_text(value),
            CacheEntry::Text(text) if text.text_content() != value => {
                text.set_text_content(value);
                true
            }
            _ => false,
        }
    }

    pub fn slot(&self, name: Option<&str>) -> Option<N> {
        match self {
            CacheEntry::Element(element) => element.slot(name),
            _ => None,
        }
    }
}

impl<N: HostNode> Dispose for CacheEntry<N> {
    fn dispose(&mut self) {
        match self {
            CacheEntry::Element(element) => element.dispose(),
            CacheEntry::Text(text) => detach(text),
            CacheEntry::Nested(cache) => cache.dispose(),
        }
    }
}

impl<N: HostNode> Nested for CacheEntry<N> {
    fn as_cache_mut(&mut self) -> Option<&mut RenderCache<Self>> {
        match self {
            CacheEntry::Nested(cache) => Some(cache),
            _ => None,
        }
    }
}
