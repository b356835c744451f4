/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Incremental render engine for templated web components.
//!
//! Compiled templates are plain Rust functions that drive a
//! [`TemplateContext`]. Every pass walks the template from the top and the
//! engine reconciles the output against what the previous pass produced:
//!
//! - Output is remembered in a positional [`RenderCache`], keyed by the
//!   template position (a hash) of each element, text node or block.
//! - Sequential regions evict entries they skip; keyed iteration reorders
//!   entries in place, so moved items keep their nodes.
//! - Attributes, text and event handlers are written only when they differ
//!   from what was applied last time.
//! - Template data is read through access paths ([`Token`]) with top-level
//!   methods, `$variables` and predicate filters.
//!
//! # Architecture
//!
//! The engine never touches a browser directly. It writes through the
//! [`Document`] and [`HostNode`] traits; [`MemoryDocument`] is an in-memory
//! implementation used by tests and by server-side rendering.
//!
//! # Example
//!
//! ```ignore
//! use webcomp_render::{MemoryDocument, TemplateContext, Token, Value};
//!
//! let doc = MemoryDocument::new();
//! let root = doc.create_element("main", None);
//! let mut ctx = TemplateContext::new(doc, root.clone());
//!
//! ctx.render(Value::map([("title", Value::from("Hi"))]), |ctx| {
//!     ctx.open(1, "h1", None);
//!     let title = ctx.get(&[Token::from("title")])?;
//!     ctx.set_text(&title.to_text());
//!     ctx.close();
//!     Ok(())
//! })?;
//!
//! assert_eq!(root.inner_markup(), "<h1>Hi</h1>");
//! ```

pub mod attributes;
pub mod cache;
pub mod collection;
pub mod context;
pub mod error;
pub mod events;
pub mod host;
pub mod memory;
pub mod methods;
pub mod node;
pub mod options;
pub mod pool;
pub mod renderer;
pub mod resolver;
pub mod scope;
pub mod value;

// Re-export main types at crate root
pub use attributes::{Attributes, attributes};
pub use cache::{CacheKey, Dispose, RenderCache};
pub use collection::Collection;
pub use context::TemplateContext;
pub use error::{RenderError, RenderResult};
pub use events::{EventBindings, EventOwner};
pub use host::{Document, EventListener, HostNode, SlotFill};
pub use memory::{MemoryDocument, MemoryNode, MutationStats};
pub use options::RenderOptions;
pub use renderer::Renderer;
pub use resolver::{Predicate, Token};
pub use scope::{Method, ValueFrame, ValueScope};
pub use value::{Function, Value, ValueMap, ValueObject};
