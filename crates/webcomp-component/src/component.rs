/*
 * component.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Component host.
//!
//! A [`Component`] binds one host element to a compiled template. It owns a
//! typed attribute model, a free-form state store and the Template Context
//! that renders into its view. Changes to either store mark the component
//! dirty and queue a render for the next frame; a forced render runs
//! immediately.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use webcomp_render::{
    Document, HostNode, RenderError, RenderOptions, RenderResult, TemplateContext, Value,
    ValueObject,
};

use crate::component_model::{ComponentModel, ModelError};
use crate::model::{Change, DataModel};
use crate::queue::{ManualScheduler, QueuedRender, RenderQueue};

/// A compiled template.
pub type Template<D> = Rc<dyn Fn(&mut TemplateContext<D>) -> RenderResult<()>>;

/// A method callable by name from templates and event handlers.
pub type ComponentMethod<D> = Rc<dyn Fn(&Component<D>, &[Value]) -> RenderResult<Value>>;

struct Hooks<D: Document> {
    will_render: Option<Box<dyn Fn(&Component<D>) -> bool>>,
    did_render: Option<Box<dyn Fn(&Component<D>)>>,
    attribute_changed: Option<Box<dyn Fn(&Component<D>, &Change)>>,
}

impl<D: Document> Default for Hooks<D> {
    fn default() -> Self {
        Self {
            will_render: None,
            did_render: None,
            attribute_changed: None,
        }
    }
}

pub struct ComponentBuilder<D: Document> {
    tag: String,
    document: D,
    element: D::Node,
    view: Option<D::Node>,
    template: Option<Template<D>>,
    model: ComponentModel,
    state: DataModel,
    options: RenderOptions,
    methods: IndexMap<String, ComponentMethod<D>>,
    hooks: Hooks<D>,
    queue: Option<Rc<RenderQueue>>,
}

impl<D: Document + 'static> ComponentBuilder<D> {
    pub fn new(tag: impl Into<String>, document: D, element: D::Node) -> Self {
        Self {
            tag: tag.into(),
            document,
            element,
            view: None,
            template: None,
            model: ComponentModel::default(),
            state: DataModel::new(),
            options: RenderOptions::default(),
            methods: IndexMap::new(),
            hooks: Hooks::default(),
            queue: None,
        }
    }

    /// Node the template renders into. Defaults to the element itself.
    pub fn view(mut self, view: D::Node) -> Self {
        self.view = Some(view);
        self
    }

    pub fn template(
        mut self,
        template: impl Fn(&mut TemplateContext<D>) -> RenderResult<()> + 'static,
    ) -> Self {
        self.template = Some(Rc::new(template));
        self
    }

    pub fn model(mut self, model: ComponentModel) -> Self {
        self.model = model;
        self
    }

    pub fn state(mut self, state: DataModel) -> Self {
        self.state = state;
        self
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Component<D>, &[Value]) -> RenderResult<Value> + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Called before every pass; returning `false` skips the pass.
    pub fn will_render(mut self, hook: impl Fn(&Component<D>) -> bool + 'static) -> Self {
        self.hooks.will_render = Some(Box::new(hook));
        self
    }

    pub fn did_render(mut self, hook: impl Fn(&Component<D>) + 'static) -> Self {
        self.hooks.did_render = Some(Box::new(hook));
        self
    }

    pub fn on_attribute_changed(
        mut self,
        hook: impl Fn(&Component<D>, &Change) + 'static,
    ) -> Self {
        self.hooks.attribute_changed = Some(Box::new(hook));
        self
    }

    /// Share a render queue with other components.
    pub fn queue(mut self, queue: Rc<RenderQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Create the component and queue its first render.
    pub fn build(self) -> Rc<Component<D>> {
        let Self {
            tag,
            document,
            element,
            view,
            template,
            model,
            state,
            options,
            methods,
            hooks,
            queue,
        } = self;
        let view = view.unwrap_or_else(|| element.clone());
        let queue = queue.unwrap_or_else(|| Rc::new(RenderQueue::new(ManualScheduler::new())));

        let component = Rc::new_cyclic(|this: &Weak<Component<D>>| {
            let owner: Weak<dyn ValueObject> = this.clone();
            let state_of = this.clone();
            let context = TemplateContext::new(document, view.clone())
                .with_options(options)
                .with_owner(owner)
                .with_method("state", move |_, args| {
                    let Some(component) = state_of.upgrade() else {
                        return Ok(Value::Null);
                    };
                    let state = component.state.borrow();
                    Ok(match args.first() {
                        Some(key) if !key.is_null() => state.get(&key.to_text()),
                        _ => state.to_value(),
                    })
                });

            Component {
                tag,
                element,
                view,
                context: RefCell::new(context),
                model: RefCell::new(model),
                state: RefCell::new(state),
                template,
                methods,
                hooks,
                queue,
                dirty: Cell::new(false),
                rendering: Cell::new(false),
                this: this.clone(),
            }
        });

        let weak = Rc::downgrade(&component);
        component.state.borrow_mut().subscribe_all(move |_| {
            if let Some(component) = weak.upgrade() {
                component.mark_dirty();
            }
        });
        let weak = Rc::downgrade(&component);
        component
            .model
            .borrow_mut()
            .data_mut()
            .subscribe_all(move |_| {
                if let Some(component) = weak.upgrade() {
                    component.mark_dirty();
                }
            });

        if component.hooks.attribute_changed.is_some() {
            let initial: Vec<Change> = {
                let model = component.model.borrow();
                model
                    .keys()
                    .into_iter()
                    .filter_map(|key| {
                        let value = model.get(&key).ok()?;
                        (!value.is_null()).then_some(Change {
                            key,
                            value,
                            previous: Value::Null,
                        })
                    })
                    .collect()
            };
            for change in &initial {
                component.attribute_changed(change);
            }
        }

        component.mark_dirty();
        component
    }
}

pub struct Component<D: Document> {
    tag: String,
    element: D::Node,
    view: D::Node,
    context: RefCell<TemplateContext<D>>,
    model: RefCell<ComponentModel>,
    state: RefCell<DataModel>,
    template: Option<Template<D>>,
    methods: IndexMap<String, ComponentMethod<D>>,
    hooks: Hooks<D>,
    queue: Rc<RenderQueue>,
    dirty: Cell<bool>,
    rendering: Cell<bool>,
    this: Weak<Self>,
}

impl<D: Document + 'static> Component<D> {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn element(&self) -> &D::Node {
        &self.element
    }

    /// Node the template renders into.
    pub fn view(&self) -> &D::Node {
        &self.view
    }

    pub fn model(&self) -> Ref<'_, ComponentModel> {
        self.model.borrow()
    }

    pub fn state(&self) -> Ref<'_, DataModel> {
        self.state.borrow()
    }

    pub fn queue(&self) -> &Rc<RenderQueue> {
        &self.queue
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.get()
    }

    pub fn get_attribute(&self, name: &str) -> Result<Value, ModelError> {
        self.model.borrow().get(name)
    }

    /// Write an attribute through the typed model and reflect it on the
    /// element. Container values are reflected as a revision marker
    /// (`.1`, `.2`, ...). Returns whether the value changed.
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> Result<bool, ModelError> {
        let (previous, value) = {
            let mut model = self.model.borrow_mut();
            let previous = model.get(name)?;
            if !model.set(name, value.into(), false)? {
                return Ok(false);
            }
            (previous, model.get(name)?)
        };

        let reflected = match &value {
            Value::List(_)
            | Value::Map(_)
            | Value::Set(_)
            | Value::Collection(_)
            | Value::Object(_)
            | Value::Function(_) => {
                let revision = self
                    .element
                    .get_attribute(name)
                    .and_then(|current| {
                        current
                            .as_str()
                            .and_then(|s| s.strip_prefix('.'))
                            .and_then(|n| n.parse::<u64>().ok())
                    })
                    .unwrap_or(0);
                Value::String(format!(".{}", revision + 1))
            }
            other => Value::String(other.to_text()),
        };
        self.element.set_attribute(name, &reflected);

        self.attribute_changed(&Change {
            key: name.to_string(),
            value,
            previous,
        });
        Ok(true)
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        if !self.element.has_attribute(name) {
            return false;
        }
        self.element.remove_attribute(name);
        let previous = {
            let mut model = self.model.borrow_mut();
            let previous = model.get(name).unwrap_or_default();
            model.delete(name);
            previous
        };
        self.attribute_changed(&Change {
            key: name.to_string(),
            value: Value::Null,
            previous,
        });
        true
    }

    /// Update one state key. Returns whether it changed.
    pub fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.state.borrow_mut().set(key, value.into(), false)
    }

    /// Flag the component for rendering and queue a render.
    pub fn mark_dirty(&self) {
        if !self.dirty.replace(true) {
            self.request_render();
        }
    }

    /// Render the component.
    ///
    /// Does nothing while a pass is running. A forced render runs now (and
    /// takes the component out of the queue); otherwise the render is
    /// queued for the next frame.
    pub fn render(&self, force: bool) -> RenderResult<()> {
        if self.rendering.get() {
            return Ok(());
        }
        if force {
            self.dirty.set(true);
            return self.render_now();
        }
        self.request_render();
        Ok(())
    }

    /// Remove everything rendered and stop reacting to changes.
    ///
    /// Fails when called from inside the component's own render pass.
    pub fn dispose(&self) -> RenderResult<()> {
        let Ok(mut context) = self.context.try_borrow_mut() else {
            return Err(self.reentrant());
        };
        if let Some(entry) = self.entry() {
            self.queue.pop(&entry);
        }
        context.dispose();
        self.state.borrow_mut().dispose();
        self.model.borrow_mut().dispose();
        self.dirty.set(false);
        Ok(())
    }

    fn reentrant(&self) -> RenderError {
        RenderError::Reentrant {
            component: self.tag.clone(),
        }
    }

    fn entry(&self) -> Option<Rc<dyn QueuedRender>> {
        self.this.upgrade().map(|this| this as Rc<dyn QueuedRender>)
    }

    fn request_render(&self) {
        if self.rendering.get() {
            return;
        }
        if let Some(entry) = self.entry() {
            self.queue.push(entry);
        }
    }

    fn render_now(&self) -> RenderResult<()> {
        if !self.dirty.get() {
            return Ok(());
        }

        self.rendering.set(true);
        if let Some(entry) = self.entry() {
            self.queue.pop(&entry);
        }

        let result = self.run_pass();
        self.dirty.set(false);
        self.rendering.set(false);

        match result {
            Ok(true) => {
                if let Some(hook) = &self.hooks.did_render {
                    hook(self);
                }
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                tracing::debug!(component = %self.tag, error = %err, "render pass failed");
                Err(err.in_component(&self.tag))
            }
        }
    }

    fn run_pass(&self) -> RenderResult<bool> {
        let Some(template) = self.template.clone() else {
            return Ok(false);
        };
        if let Some(hook) = &self.hooks.will_render {
            if !hook(self) {
                return Ok(false);
            }
        }

        let data = self
            .this
            .upgrade()
            .map_or(Value::Null, |this| Value::Object(this));
        let Ok(mut context) = self.context.try_borrow_mut() else {
            return Err(self.reentrant());
        };
        context.render(data, |ctx| template(ctx))?;
        tracing::trace!(component = %self.tag, "rendered");
        Ok(true)
    }

    fn attribute_changed(&self, change: &Change) {
        if let Some(hook) = &self.hooks.attribute_changed {
            hook(self, change);
        }
    }
}

impl<D: Document + 'static> ValueObject for Component<D> {
    fn get(&self, key: &str) -> Value {
        self.model.borrow().get(key).unwrap_or_default()
    }

    fn keys(&self) -> Vec<String> {
        self.model.borrow().keys()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        Some(self.get(name))
    }

    fn call(&self, method: &str, args: &[Value]) -> Option<RenderResult<Value>> {
        let method = self.methods.get(method).cloned()?;
        Some(method(self, args))
    }
}

impl<D: Document + 'static> QueuedRender for Component<D> {
    fn render_queued(&self) -> RenderResult<()> {
        self.render(true)
    }

    fn queue_name(&self) -> String {
        self.tag.clone()
    }
}

impl<D: Document> fmt::Debug for Component<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("tag", &self.tag)
            .field("element", &self.element)
            .field("dirty", &self.dirty.get())
            .field("rendering", &self.rendering.get())
            .finish_non_exhaustive()
    }
}
