/*
 * renderer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The reconciliation engine.
//!
//! A template drives the renderer with a flat stream of instructions
//! (`open`, `attr`, `add_text`, `close`, ...). The renderer walks the
//! Positional Render Cache in lockstep with that stream: each call site
//! either reuses the node cached for its hash or creates a new one, and
//! attributes and handlers are diffed against what was applied last time.
//! No intermediate tree is ever built.
//!
//! Open elements are tracked as a stack of pooled Render Contexts. A
//! context records where the element's children go (the element itself, or
//! one of its named content slots) and whether anything below it changed;
//! that flag bubbles up on `close`.

use crate::attributes::{self, Attributes};
use crate::cache::{CacheKey, Nested, RenderCache};
use crate::events::EventOwner;
use crate::host::{Document, HostNode, SlotFill, insert_child_at};
use crate::node::{CacheEntry, RenderNode};
use crate::options::RenderOptions;
use crate::pool::{ContextPool, Reset};
use crate::value::Value;

/// Where the Render Node Container of an open element lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum NodeRef {
    /// The render root.
    #[default]
    Target,

    /// A slot of the active cache, by arena index.
    Slot(usize),

    /// The cache path broke; the element has no container.
    Lost,
}

/// One open element.
#[derive(Debug)]
struct RenderContext<N> {
    node: Option<N>,
    entry: NodeRef,

    /// Depth of the active cache path when the element was opened.
    cache_depth: usize,

    allow_slots: bool,
    attributes: Option<Attributes>,
    namespace: Option<String>,
    updated: bool,
    children: usize,
    slot_fill: SlotFill,
}

impl<N> Default for RenderContext<N> {
    fn default() -> Self {
        Self {
            node: None,
            entry: NodeRef::Target,
            cache_depth: 0,
            allow_slots: false,
            attributes: None,
            namespace: None,
            updated: false,
            children: 0,
            slot_fill: SlotFill::default(),
        }
    }
}

impl<N> Reset for RenderContext<N> {
    fn reset(&mut self) {
        self.node = None;
        self.entry = NodeRef::Target;
        self.cache_depth = 0;
        self.allow_slots = false;
        self.attributes = None;
        self.namespace = None;
        self.updated = false;
        self.children = 0;
        self.slot_fill.clear();
    }
}

type Cache<N> = RenderCache<CacheEntry<N>>;

pub struct Renderer<D: Document> {
    document: D,
    target: RenderNode<D::Node>,
    cache: Cache<D::Node>,

    /// Arena indices leading from the root cache to the active nested cache.
    cache_path: Vec<usize>,

    contexts: ContextPool<RenderContext<D::Node>>,
    options: RenderOptions,
    owner: Option<EventOwner>,
    rendering: bool,
}

impl<D: Document> Renderer<D> {
    /// Create a renderer for `target`. The target itself is never created,
    /// moved or destroyed by the renderer.
    pub fn new(document: D, target: D::Node) -> Self {
        Self::with_options(document, target, RenderOptions::default())
    }

    pub fn with_options(document: D, target: D::Node, options: RenderOptions) -> Self {
        Self {
            document,
            target: RenderNode::borrowed(target),
            cache: RenderCache::new(),
            cache_path: Vec::new(),
            contexts: ContextPool::new(),
            options,
            owner: None,
            rendering: false,
        }
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Set the object event-handler method names resolve against.
    pub fn set_owner(&mut self, owner: Option<EventOwner>) {
        self.owner = owner;
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn target(&self) -> Option<&D::Node> {
        self.target.node()
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Number of currently open contexts, including the root.
    pub fn depth(&self) -> usize {
        self.contexts.depth()
    }

    /// Keys of the root cache, in list order.
    pub fn cache_keys(&self) -> Vec<CacheKey> {
        self.cache.keys()
    }

    /// Node of the innermost open element.
    pub fn current_node(&self) -> Option<&D::Node> {
        self.contexts.current().and_then(|ctx| ctx.node.as_ref())
    }

    /// Start a render pass.
    pub fn begin(&mut self) {
        if self.rendering {
            tracing::warn!("render pass started while another was active");
            self.abort();
        }
        self.rendering = true;
        self.cache_path.clear();
        self.cache.reset();

        let node = self.target.node().cloned();
        let allow_slots = self.options.allow_slots;
        let ctx = self.contexts.acquire();
        ctx.node = node;
        ctx.entry = NodeRef::Target;
        ctx.allow_slots = allow_slots;
        tracing::debug!("render pass started");
    }

    /// End a render pass: evict everything the pass did not reach.
    pub fn finalize(&mut self) {
        self.cache_path.clear();
        self.cache.finalize();

        // Unclosed elements are dropped; the root context is the outermost
        while self.contexts.depth() > 1 {
            self.contexts.release();
        }
        if let Some(root) = self.contexts.current_mut() {
            let fill = std::mem::take(&mut root.slot_fill);
            let updated = root.updated;
            if self.options.allow_slots && (updated || self.target.slot_fill_changed(&fill)) {
                self.target.render_slots(&fill);
            }
        }
        self.contexts.release_all();
        self.rendering = false;
        tracing::debug!(cached = self.cache.len(), "render pass finished");
    }

    /// Abandon the current pass after an error.
    ///
    /// Host mutations already applied stay in place; the cache stays
    /// consistent and the next pass starts from its beginning.
    pub fn abort(&mut self) {
        self.contexts.release_all();
        self.cache_path.clear();
        self.cache.reset();
        self.rendering = false;
        tracing::debug!("render pass aborted");
    }

    /// Tear down everything the renderer ever created.
    pub fn dispose(&mut self) {
        self.abort();
        self.cache.dispose();
    }

    /// Open an element for the call site `hash`.
    pub fn open(&mut self, hash: impl Into<CacheKey>, name: &str, attrs: Option<Attributes>) {
        let key = hash.into();
        let parent_namespace = self
            .contexts
            .current()
            .and_then(|ctx| ctx.namespace.clone());
        let namespace = attrs
            .as_ref()
            .and_then(|a| a.get("xmlns"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(parent_namespace);
        let slot = attrs
            .as_ref()
            .and_then(|a| a.get("slot"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(cache) = self.cache.descend(&self.cache_path) else {
            tracing::warn!(element = name, "cache path lost, element skipped");
            let ctx = self.contexts.acquire();
            ctx.entry = NodeRef::Lost;
            ctx.namespace = namespace;
            return;
        };
        let mut updated = cache.next_key() != Some(&key);
        let entered = cache.enter(&key, true);
        let reused = entered && matches!(cache.current(), Some(CacheEntry::Element(_)));

        if !reused {
            let element = self.create_element(name, attrs.as_ref(), namespace.as_deref());
            if let Some(cache) = self.cache.descend(&self.cache_path) {
                store(cache, entered, key, CacheEntry::Element(element));
            }
            updated = true;
        }

        let mut entry = NodeRef::Lost;
        let mut node = None;
        let mut allow_slots = false;
        if let Some(cache) = self.cache.descend(&self.cache_path) {
            entry = NodeRef::Slot(cache.current_index());
            if let Some(CacheEntry::Element(element)) = cache.current() {
                node = element.node().cloned();
                allow_slots = element.allow_slots();
            }
        }

        if let Some(node) = &node {
            self.place(node, slot.as_deref());
            if let Some(element) = self.element_at(self.cache_path.len(), entry) {
                element.set_attached();
            }
        }

        let cache_depth = self.cache_path.len();
        let ctx = self.contexts.acquire();
        ctx.node = node;
        ctx.entry = entry;
        ctx.cache_depth = cache_depth;
        ctx.allow_slots = allow_slots;
        ctx.attributes = attrs;
        ctx.namespace = namespace;
        ctx.updated = updated;
    }

    /// Close the innermost element, reconciling its attributes.
    pub fn close(&mut self) {
        if self.contexts.depth() <= 1 {
            tracing::warn!("close without matching open");
            return;
        }
        let Some(ctx) = self.contexts.current_mut() else {
            return;
        };
        let entry = ctx.entry;
        let cache_depth = ctx.cache_depth;
        let attrs = ctx.attributes.take().unwrap_or_default();
        let fill = std::mem::take(&mut ctx.slot_fill);
        let descendants_updated = ctx.updated;
        self.contexts.release();

        let event_prefix = self.options.event_prefix.clone();
        let owner = self.owner.clone();
        let Some(node) = self.element_at(cache_depth, entry) else {
            return;
        };

        let changed = node.sync(attrs, &event_prefix, owner.as_ref());
        if changed || descendants_updated || node.slot_fill_changed(&fill) {
            node.render_slots(&fill);
            if let Some(parent) = self.contexts.current_mut() {
                parent.updated = true;
            }
        }
    }

    /// Set an attribute on the innermost element.
    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(ctx) = self.contexts.current_mut() {
            ctx.attributes
                .get_or_insert_with(Attributes::new)
                .insert(name.into(), value.into());
        }
    }

    /// Add a class token to the innermost element.
    pub fn add_class(&mut self, value: &str) {
        if let Some(ctx) = self.contexts.current_mut() {
            let attrs = ctx.attributes.get_or_insert_with(Attributes::new);
            let class = attributes::add_class(attrs.get("class"), value);
            attrs.insert("class".to_string(), Value::String(class));
        }
    }

    /// Replace the content of the innermost element with text.
    ///
    /// For a component-like element the text goes into its default content
    /// slot instead.
    pub fn set_text(&mut self, value: &str) -> bool {
        let Some(ctx) = self.contexts.current_mut() else {
            return false;
        };

        let default_slot = if ctx.allow_slots {
            ctx.node.as_ref().and_then(|node| node.slot(None))
        } else {
            None
        };
        if let Some(slot) = default_slot {
            ctx.slot_fill.set(None, 1);
            if slot.text_content() != value {
                slot.set_text_content(value);
                ctx.updated = true;
                return true;
            }
            return false;
        }

        ctx.children = 1;
        let entry = ctx.entry;
        let cache_depth = ctx.cache_depth;
        let changed = self
            .element_at(cache_depth, entry)
            .is_some_and(|node| node.set_text(value));
        if changed {
            if let Some(ctx) = self.contexts.current_mut() {
                ctx.updated = true;
            }
        }
        changed
    }

    /// Add a text node for the call site `hash`.
    pub fn add_text(&mut self, hash: impl Into<CacheKey>, value: &str) {
        let key = hash.into();
        let Some(cache) = self.cache.descend(&self.cache_path) else {
            tracing::warn!("cache path lost, text skipped");
            return;
        };
        let entered = cache.enter(&key, true);
        let reused = entered && matches!(cache.current(), Some(CacheEntry::Text(_)));

        let updated = if reused {
            cache.current_mut().is_some_and(|entry| entry.set_text(value))
        } else {
            let text = self.document.create_text(value);
            store(cache, entered, key, CacheEntry::Text(text));
            true
        };
        let node = cache.current().and_then(CacheEntry::node).cloned();
        if let Some(node) = node {
            self.place(&node, None);
        }
        if updated {
            if let Some(ctx) = self.contexts.current_mut() {
                ctx.updated = true;
            }
        }
    }

    /// Whether the innermost element is a content slot that received no
    /// content from outside.
    pub fn empty_slot(&self) -> bool {
        self.current_node()
            .is_none_or(|node| !node.has_attribute("slotted"))
    }

    /// Enter (or create) a nested cache for a scoped template region.
    pub fn push_cache(&mut self, hash: impl Into<CacheKey>, sequential: bool) {
        let key = hash.into();
        let Some(cache) = self.cache.descend(&self.cache_path) else {
            tracing::warn!(key = %key, "cache path lost, nested cache skipped");
            return;
        };
        let entered = cache.enter(&key, sequential);
        let reused = entered && matches!(cache.current(), Some(CacheEntry::Nested(_)));
        if !reused {
            store(cache, entered, key, CacheEntry::Nested(RenderCache::new()));
        }

        let index = cache.current_index();
        if let Some(inner) = cache.current_mut().and_then(CacheEntry::as_cache_mut) {
            inner.reset();
        }
        self.cache_path.push(index);
    }

    /// Finalize the active nested cache and return to its parent.
    pub fn pop_cache(&mut self) {
        if self.cache_path.is_empty() {
            return;
        }
        if let Some(cache) = self.cache.descend(&self.cache_path) {
            cache.finalize();
        }
        self.cache_path.pop();
    }

    /// Render Node Container behind `entry`, looked up in the cache that was
    /// active at `cache_depth`.
    fn element_at(&mut self, cache_depth: usize, entry: NodeRef) -> Option<&mut RenderNode<D::Node>> {
        match entry {
            NodeRef::Target => Some(&mut self.target),
            NodeRef::Slot(index) => {
                let path = &self.cache_path[..cache_depth.min(self.cache_path.len())];
                self.cache
                    .descend(path)?
                    .value_at_mut(index)
                    .and_then(CacheEntry::as_element_mut)
            }
            NodeRef::Lost => None,
        }
    }

    fn create_element(
        &self,
        name: &str,
        attrs: Option<&Attributes>,
        namespace: Option<&str>,
    ) -> RenderNode<D::Node> {
        if name == self.options.slot_element {
            let slot_name = attrs.and_then(|a| a.get("name")).and_then(Value::as_str);
            if let Some(slot) = self.target.node().and_then(|target| target.slot(slot_name)) {
                tracing::trace!(slot = ?slot_name, "reusing content slot of render root");
                return RenderNode::borrowed(slot);
            }
        }

        tracing::trace!(element = name, namespace, "created element");
        RenderNode::new(self.document.create_element(name, namespace), true)
    }

    /// Insert `child` at the next position of the innermost element, or of
    /// its content slot `slot`.
    fn place(&mut self, child: &D::Node, slot: Option<&str>) -> bool {
        let Some(ctx) = self.contexts.current_mut() else {
            return false;
        };
        let Some(parent) = ctx.node.clone() else {
            return false;
        };

        // A slot placeholder rendered into its own host goes in directly
        let slot_target = if ctx.allow_slots {
            parent.slot(slot).filter(|target| target != child)
        } else {
            None
        };
        match slot_target {
            Some(target) => {
                let position = ctx.slot_fill.advance(slot);
                insert_child_at(&target, child, position)
            }
            None => {
                let position = ctx.children;
                ctx.children += 1;
                insert_child_at(&parent, child, position)
            }
        }
    }
}

/// Store `value` for `key` at the cursor: in place when the cursor already
/// sits on a slot with that key, in a new slot otherwise.
fn store<N: HostNode>(cache: &mut Cache<N>, entered: bool, key: CacheKey, value: CacheEntry<N>) {
    if entered {
        cache.replace_current(value);
    } else {
        cache.insert(key, value);
    }
}
