/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Components on top of `webcomp-render`.
//!
//! This crate provides the pieces that turn a compiled template into a live
//! component:
//!
//! - [`DataModel`]: reactive key/value store with change subscriptions
//! - [`ComponentModel`]: typed attribute model with declared defaults
//! - [`RenderQueue`]: batches unforced renders into one frame callback
//! - [`Component`]: binds a host element, its models and a template
//!
//! ```ignore
//! let component = ComponentBuilder::new("x-greeting", document, element)
//!     .model(ComponentModel::from_json(&definition)?)
//!     .template(|ctx| {
//!         let name = ctx.get(&[Token::from("@name")])?;
//!         ctx.add_text(1, &format!("Hello {}", name.to_text()));
//!         Ok(())
//!     })
//!     .build();
//!
//! component.set_attribute("name", "world")?;
//! component.queue().drain();
//! ```

pub mod component;
pub mod component_model;
pub mod model;
pub mod queue;

pub use component::{Component, ComponentBuilder, ComponentMethod, Template};
pub use component_model::{ComponentModel, KeyDefinition, ModelError, ValueType, cast_value};
pub use model::{Change, DataModel, Listener, SubscriptionId};
pub use queue::{FrameScheduler, ManualScheduler, QueuedRender, RenderQueue};
