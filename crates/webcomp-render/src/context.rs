/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template Context: the surface compiled templates run against.
//!
//! A compiled template is a function receiving `&mut TemplateContext`. It
//! reads data through [`TemplateContext::get`], introduces scopes through
//! [`TemplateContext::iterate`] and [`TemplateContext::variable`], and emits
//! output through the renderer instructions (`open`, `attr`, `add_text`,
//! `close`, ...).
//!
//! ```ignore
//! ctx.render(data, |ctx| {
//!     ctx.open(1, "ul", None);
//!     let items = ctx.get(&["items".into()])?;
//!     ctx.iterate(2, &items, |ctx| {
//!         ctx.open(3, "li", None);
//!         let text = ctx.get(&["label".into()])?;
//!         ctx.add_text(4, &text.to_text());
//!         ctx.close();
//!         Ok(())
//!     })?;
//!     ctx.close();
//!     Ok(())
//! })?;
//! ```

use crate::attributes::Attributes;
use crate::cache::CacheKey;
use crate::error::RenderResult;
use crate::events::EventOwner;
use crate::host::Document;
use crate::options::RenderOptions;
use crate::renderer::Renderer;
use crate::resolver::Token;
use crate::scope::{Method, ValueFrame, ValueScope};
use crate::value::Value;

/// Name of the Value Context a pass starts with.
pub const ROOT_NAME: &str = "#root";

type Body<'a, C> = dyn FnMut(&mut C) -> RenderResult<()> + 'a;
type KeyFn<'a, C> = dyn FnMut(&mut C) -> RenderResult<Value> + 'a;

pub struct TemplateContext<D: Document> {
    renderer: Renderer<D>,
    scope: ValueScope,
}

impl<D: Document> TemplateContext<D> {
    /// Create a context rendering into `target`.
    pub fn new(document: D, target: D::Node) -> Self {
        Self {
            renderer: Renderer::new(document, target),
            scope: ValueScope::new(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.renderer.set_options(options);
        self
    }

    /// Register an extra top-level method, overriding a default of the same
    /// name.
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&ValueFrame, &[Value]) -> RenderResult<Value> + 'static,
    ) -> Self {
        self.scope.register_method(name, method);
        self
    }

    /// Merge a host method table over the defaults.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = (String, Method)>) -> Self {
        for (name, method) in methods {
            self.scope
                .register_method(name, move |frame, args| method(frame, args));
        }
        self
    }

    pub fn with_owner(mut self, owner: EventOwner) -> Self {
        self.renderer.set_owner(Some(owner));
        self
    }

    pub fn set_owner(&mut self, owner: Option<EventOwner>) {
        self.renderer.set_owner(owner);
    }

    pub fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    pub fn scope(&mut self) -> &mut ValueScope {
        &mut self.scope
    }

    pub fn is_rendering(&self) -> bool {
        self.renderer.is_rendering()
    }

    /// Run one complete render pass of `template` against `data`.
    ///
    /// If the template fails, the pass is abandoned: every pooled context is
    /// released and the error is returned unchanged.
    pub fn render<F>(&mut self, data: Value, template: F) -> RenderResult<()>
    where
        F: FnOnce(&mut Self) -> RenderResult<()>,
    {
        self.begin(data);
        match template(self) {
            Ok(()) => {
                self.end();
                Ok(())
            }
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    pub fn begin(&mut self, data: Value) {
        self.renderer.begin();
        self.scope.clear();
        self.scope.enter(data, Value::from(ROOT_NAME), 0);
    }

    pub fn end(&mut self) {
        self.scope.clear();
        self.renderer.finalize();
    }

    pub fn abort(&mut self) {
        self.scope.clear();
        self.renderer.abort();
    }

    /// Remove everything this context ever rendered.
    pub fn dispose(&mut self) {
        self.scope.clear();
        self.renderer.dispose();
    }

    /// Resolve an access path against the current Value Context.
    pub fn get(&mut self, tokens: &[Token]) -> RenderResult<Value> {
        self.scope.get(tokens)
    }

    /// The current value.
    pub fn value(&self) -> Value {
        self.scope.value()
    }

    /// Bind a block-scoped variable.
    pub fn variable(&mut self, name: impl Into<String>, value: Value) {
        self.scope.variable(name, value);
    }

    /// Render `body` once per item of `collection`, reusing each item's
    /// output by position.
    pub fn iterate<F>(
        &mut self,
        hash: impl Into<CacheKey>,
        collection: &Value,
        mut body: F,
    ) -> RenderResult<()>
    where
        F: FnMut(&mut Self) -> RenderResult<()>,
    {
        self.iterate_with(hash.into(), collection, &mut body, None)
    }

    /// Like [`iterate`](Self::iterate), but each item's output is cached
    /// under the key returned by `key_fn`, so reordered items keep their
    /// nodes. A null key falls back to the item's position.
    pub fn iterate_keyed<F, K>(
        &mut self,
        hash: impl Into<CacheKey>,
        collection: &Value,
        mut body: F,
        mut key_fn: K,
    ) -> RenderResult<()>
    where
        F: FnMut(&mut Self) -> RenderResult<()>,
        K: FnMut(&mut Self) -> RenderResult<Value>,
    {
        self.iterate_with(hash.into(), collection, &mut body, Some(&mut key_fn))
    }

    fn iterate_with(
        &mut self,
        hash: CacheKey,
        collection: &Value,
        body: &mut Body<'_, Self>,
        mut key_fn: Option<&mut KeyFn<'_, Self>>,
    ) -> RenderResult<()> {
        self.renderer.push_cache(hash, true);

        for (position, (name, value)) in entries(collection).into_iter().enumerate() {
            self.scope.enter(value, name, position);
            let result = self.iterate_item(position, body, key_fn.as_deref_mut());
            self.scope.exit();
            result?;
        }

        self.renderer.pop_cache();
        Ok(())
    }

    /// One loop-body invocation. It owns a variable scope, which also holds
    /// whatever the key function binds.
    fn iterate_item(
        &mut self,
        position: usize,
        body: &mut Body<'_, Self>,
        key_fn: Option<&mut KeyFn<'_, Self>>,
    ) -> RenderResult<()> {
        self.scope.enter_owner();
        let result = self.render_item(position, body, key_fn);
        self.scope.exit_owner();
        result
    }

    fn render_item(
        &mut self,
        position: usize,
        body: &mut Body<'_, Self>,
        key_fn: Option<&mut KeyFn<'_, Self>>,
    ) -> RenderResult<()> {
        let key = match key_fn {
            Some(key_fn) => cache_key(&key_fn(self)?),
            None => None,
        };
        match key {
            Some(key) => self.renderer.push_cache(key, false),
            None => self.renderer.push_cache(position, true),
        }

        body(self)?;
        self.renderer.pop_cache();
        Ok(())
    }

    pub fn open(&mut self, hash: impl Into<CacheKey>, name: &str, attrs: Option<Attributes>) {
        self.renderer.open(hash, name, attrs);
        self.scope.enter_owner();
    }

    pub fn close(&mut self) {
        self.scope.exit_owner();
        self.renderer.close();
    }

    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.renderer.attr(name, value);
    }

    pub fn add_class(&mut self, value: &str) {
        self.renderer.add_class(value);
    }

    pub fn set_text(&mut self, value: &str) -> bool {
        self.renderer.set_text(value)
    }

    pub fn add_text(&mut self, hash: impl Into<CacheKey>, value: &str) {
        self.renderer.add_text(hash, value);
    }

    /// Whether the innermost element is a content slot nobody filled.
    pub fn empty_slot(&self) -> bool {
        self.renderer.empty_slot()
    }

    /// Start a nested cache region (conditional blocks and the like).
    pub fn push_cache(&mut self, hash: impl Into<CacheKey>, sequential: bool) {
        self.renderer.push_cache(hash, sequential);
    }

    pub fn pop_cache(&mut self) {
        self.renderer.pop_cache();
    }
}

/// Iteration entries of a collection as `(name, value)` pairs.
///
/// Sequences are named by index, sets by member, maps and objects by key.
/// Null yields nothing; any other value is a one-element collection.
fn entries(collection: &Value) -> Vec<(Value, Value)> {
    match collection {
        Value::Null => Vec::new(),
        Value::List(items) => indexed(items),
        Value::Collection(c) => indexed(c.items()),
        Value::Set(items) => items.iter().map(|v| (v.clone(), v.clone())).collect(),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect(),
        Value::Object(object) => object
            .keys()
            .into_iter()
            .map(|k| {
                let value = object.get(&k);
                (Value::String(k), value)
            })
            .collect(),
        single => vec![(Value::from(0), single.clone())],
    }
}

fn indexed(items: &[Value]) -> Vec<(Value, Value)> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| (Value::from(i), v.clone()))
        .collect()
}

/// Cache identity for a user-supplied item key. Null means "no key".
fn cache_key(value: &Value) -> Option<CacheKey> {
    match value {
        Value::Null => None,
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Some(CacheKey::Int(*n as i64)),
        Value::String(s) => Some(CacheKey::Str(s.clone())),
        other => Some(CacheKey::Str(other.to_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::attributes;
    use crate::error::RenderError;
    use crate::memory::{MemoryDocument, MemoryNode};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn setup() -> (MemoryDocument, MemoryNode, TemplateContext<MemoryDocument>) {
        let doc = MemoryDocument::new();
        let root = doc.create_element("main", None);
        let ctx = TemplateContext::new(doc.clone(), root.clone());
        (doc, root, ctx)
    }

    fn key(name: &str) -> Vec<Token> {
        vec![Token::from(name)]
    }

    #[test]
    fn test_entries_naming() {
        let names = |v: &Value| -> Vec<String> {
            entries(v).into_iter().map(|(n, _)| n.to_text()).collect()
        };
        assert_eq!(names(&Value::list([Value::Null, Value::Null])), vec!["0", "1"]);
        assert_eq!(names(&Value::map([("a", Value::Null)])), vec!["a"]);
        assert_eq!(names(&Value::set([Value::from("m")])), vec!["m"]);
        assert_eq!(names(&Value::from(7)), vec!["0"]);
        assert!(entries(&Value::Null).is_empty());
    }

    #[test]
    fn test_cache_key_from_values() {
        assert_eq!(cache_key(&Value::Null), None);
        assert_eq!(cache_key(&Value::from(4)), Some(CacheKey::Int(4)));
        assert_eq!(cache_key(&Value::from("k")), Some(CacheKey::from("k")));
        assert_eq!(cache_key(&Value::from(1.5)), Some(CacheKey::from("1.5")));
    }

    #[test]
    fn test_iteration_binds_name_and_position() {
        let (_, root, mut ctx) = setup();
        let data = Value::map([(
            "items",
            Value::map([("x", Value::from(10)), ("y", Value::from(20))]),
        )]);

        ctx.render(data, |ctx| {
            let items = ctx.get(&key("items"))?;
            ctx.iterate(1, &items, |ctx| {
                let name = ctx.get(&[Token::call("name", [])])?;
                let position = ctx.get(&[Token::call("position", [])])?;
                let value = ctx.get(&[Token::SelfRef])?;
                ctx.open(2, "i", None);
                ctx.add_text(3, &format!("{}{}={}", name.to_text(), position.to_text(), value.to_text()));
                ctx.close();
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(root.inner_markup(), "<i>x0=10</i><i>y1=20</i>");
    }

    #[test]
    fn test_loop_variables_do_not_leak() {
        let (_, _, mut ctx) = setup();
        let mut seen_after = Value::from("unset");

        ctx.render(Value::list([Value::from(1), Value::from(2)]), |ctx| {
            ctx.variable("outer", Value::from("o"));
            let items = ctx.value();
            ctx.iterate(1, &items, |ctx| {
                let value = ctx.get(&[Token::SelfRef])?;
                ctx.variable("item", value);
                assert_eq!(ctx.get(&key("$outer"))?, Value::from("o"));
                Ok(())
            })?;
            seen_after = ctx.get(&key("$item"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(seen_after, Value::Null);
    }

    #[test]
    fn test_key_function_variables_stay_in_item_scope() {
        let (_, root, mut ctx) = setup();
        let mut seen_after = Value::from("unset");

        ctx.render(Value::list([Value::from("a"), Value::from("b")]), |ctx| {
            let items = ctx.value();
            ctx.iterate_keyed(
                1,
                &items,
                |ctx| {
                    let key = ctx.get(&key("$key"))?;
                    ctx.add_text(2, &key.to_text());
                    Ok(())
                },
                |ctx| {
                    let item = ctx.get(&[Token::SelfRef])?;
                    ctx.variable("key", Value::from(format!("k-{}", item.to_text())));
                    Ok(item)
                },
            )?;
            seen_after = ctx.get(&key("$key"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(root.inner_markup(), "k-ak-b");
        assert_eq!(seen_after, Value::Null);
    }

    #[test]
    fn test_element_variables_end_with_element() {
        let (_, _, mut ctx) = setup();
        let mut inside = Value::Null;
        let mut outside = Value::from("unset");

        ctx.render(Value::Null, |ctx| {
            ctx.open(1, "div", None);
            ctx.variable("v", Value::from(1));
            inside = ctx.get(&key("$v"))?;
            ctx.close();
            outside = ctx.get(&key("$v"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(inside, Value::from(1));
        assert_eq!(outside, Value::Null);
    }

    #[test]
    fn test_custom_methods_override_defaults() {
        let doc = MemoryDocument::new();
        let root = doc.create_element("main", None);
        let mut ctx = TemplateContext::new(doc, root)
            .with_method("count", |_, _| Ok(Value::from(-1)))
            .with_method("shout", |_, args| Ok(Value::from(args[0].to_text().to_uppercase())));

        let mut results = Vec::new();
        ctx.render(Value::Null, |ctx| {
            results.push(ctx.get(&[Token::call("count", [Value::Null])])?);
            results.push(ctx.get(&[Token::call("shout", [Value::from("hey")])])?);
            Ok(())
        })
        .unwrap();

        assert_eq!(results, vec![Value::from(-1), Value::from("HEY")]);
    }

    #[test]
    fn test_method_table_merges_over_defaults() {
        let doc = MemoryDocument::new();
        let root = doc.create_element("main", None);
        let twice: Method =
            Rc::new(|_: &ValueFrame, args: &[Value]| Ok(Value::from(args[0].to_number() * 2.0)));
        let table = vec![("twice".to_string(), twice)];
        let mut ctx = TemplateContext::new(doc, root).with_methods(table);

        let mut results = Vec::new();
        ctx.render(Value::Null, |ctx| {
            results.push(ctx.get(&[Token::call("twice", [Value::from(4)])])?);
            results.push(ctx.get(&[Token::call("round", [Value::from(2.5)])])?);
            Ok(())
        })
        .unwrap();

        assert_eq!(results, vec![Value::from(8), Value::from(3)]);
    }

    #[test]
    fn test_error_aborts_pass_and_next_pass_recovers() {
        let (doc, root, mut ctx) = setup();
        let template = |fail: bool| {
            move |ctx: &mut TemplateContext<MemoryDocument>| -> RenderResult<()> {
                ctx.open(1, "section", Some(attributes([("id", "s")])));
                let items = Value::list([Value::from("a"), Value::from("b")]);
                ctx.iterate(2, &items, |ctx| {
                    let item = ctx.get(&[Token::SelfRef])?;
                    if fail && item == Value::from("b") {
                        return Err(RenderError::template("bad item"));
                    }
                    ctx.open(3, "p", None);
                    ctx.set_text(&item.to_text());
                    ctx.close();
                    Ok(())
                })?;
                ctx.close();
                Ok(())
            }
        };

        ctx.render(Value::Null, template(false)).unwrap();
        let before = root.to_markup();

        let err = ctx.render(Value::Null, template(true)).unwrap_err();
        assert!(matches!(err, RenderError::Template { .. }));
        assert!(!ctx.is_rendering());
        assert_eq!(ctx.renderer().depth(), 0);
        assert_eq!(ctx.scope().depth(), 0);

        doc.reset_stats();
        ctx.render(Value::Null, template(false)).unwrap();
        assert_eq!(root.to_markup(), before);
        assert_eq!(doc.stats().elements_created, 0);
    }
}
