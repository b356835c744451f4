/*
 * events.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Event-handler bindings of one rendered node.
//!
//! A node gets at most one platform listener per event type. The listener
//! looks the handler up in the node's handler table when the event fires,
//! so swapping handlers between passes only touches the table.
//!
//! Handler values take three shapes:
//!
//! - a function, called with `[event, owner]`;
//! - a method name, resolved against the owner object;
//! - a list `[method, extra...]`, called with `[extra..., event, owner]`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{RenderError, RenderResult};
use crate::host::{EventListener, HostNode};
use crate::value::{Value, ValueObject};

/// Object event handlers are resolved against (usually the component whose
/// view is being rendered).
pub type EventOwner = Weak<dyn ValueObject>;

type HandlerTable = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Debug, Default)]
pub struct EventBindings {
    handlers: HandlerTable,
}

impl EventBindings {
    /// Bind `handler` to `event` on `node`. A null handler unbinds.
    ///
    /// Returns `true` when the platform listener was (re)registered or
    /// removed, `false` when the binding was already current.
    pub fn set<N: HostNode>(
        &mut self,
        node: &N,
        event: &str,
        handler: &Value,
        owner: Option<&EventOwner>,
    ) -> bool {
        if handler.is_null() {
            let removed = self.handlers.borrow_mut().shift_remove(event).is_some();
            if removed {
                node.remove_event_listener(event);
            }
            return removed;
        }

        if self.handlers.borrow().get(event) == Some(handler) {
            return false;
        }

        self.handlers
            .borrow_mut()
            .insert(event.to_string(), handler.clone());
        node.add_event_listener(event, self.listener(event, owner));
        tracing::trace!(event, "registered event listener");
        true
    }

    /// Remove every listener from `node`.
    pub fn clear<N: HostNode>(&mut self, node: &N) {
        for (event, _) in self.handlers.borrow_mut().drain(..) {
            node.remove_event_listener(&event);
        }
    }

    pub fn handler(&self, event: &str) -> Option<Value> {
        self.handlers.borrow().get(event).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    fn listener(&self, event: &str, owner: Option<&EventOwner>) -> EventListener {
        let table = Rc::downgrade(&self.handlers);
        let event = event.to_string();
        let owner = owner.cloned();

        Rc::new(move |event_value: &Value| {
            let Some(table) = table.upgrade() else {
                return Ok(());
            };
            let handler = table.borrow().get(&event).cloned();
            match handler {
                Some(handler) => {
                    let owner = owner.as_ref().and_then(Weak::upgrade);
                    invoke(&handler, &event, event_value, owner)
                }
                None => Ok(()),
            }
        })
    }
}

/// Run one handler value for a fired event.
pub fn invoke(
    handler: &Value,
    event: &str,
    event_value: &Value,
    owner: Option<Rc<dyn ValueObject>>,
) -> RenderResult<()> {
    let owner_value = owner.clone().map_or(Value::Null, Value::Object);
    let args = [event_value.clone(), owner_value];

    let result = match handler {
        Value::Function(f) => f.call(&args).map(drop),
        Value::String(method) => call_owner(owner.as_deref(), method, &args),
        Value::List(items) => match items.split_first() {
            Some((head, extra)) => {
                let args: Vec<Value> = extra.iter().cloned().chain(args).collect();
                match head {
                    Value::String(method) => call_owner(owner.as_deref(), method, &args),
                    Value::Function(f) => f.call(&args).map(drop),
                    _ => Ok(()),
                }
            }
            None => Ok(()),
        },
        _ => Ok(()),
    };

    result.map_err(|err| match err {
        RenderError::Handler { .. } => err,
        other => RenderError::Handler {
            event: event.to_string(),
            message: other.to_string(),
        },
    })
}

// Unknown methods are ignored
fn call_owner(owner: Option<&dyn ValueObject>, method: &str, args: &[Value]) -> RenderResult<()> {
    match owner.and_then(|owner| owner.call(method, args)) {
        Some(result) => result.map(drop),
        None => Ok(()),
    }
}
