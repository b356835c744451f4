/*
 * scope.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Value scoping for template execution.
//!
//! [`ValueScope`] holds everything a template reads data through:
//!
//! - the Value Context stack: the current value plus the name and position
//!   it was reached by, one frame per iteration item or predicate candidate;
//! - block-scoped template variables;
//! - the table of top-level methods callable from access paths.
//!
//! It is kept apart from the renderer so that predicates, which run in the
//! middle of value resolution, can be handed a `&mut ValueScope` without
//! touching render state.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{RenderError, RenderResult};
use crate::methods;
use crate::pool::{ContextPool, Reset};
use crate::resolver::{self, Predicate, Token};
use crate::value::Value;

/// A top-level method. Receives the current Value Context and the literal
/// call arguments.
pub type Method = Rc<dyn Fn(&ValueFrame, &[Value]) -> RenderResult<Value>>;

/// One Value Context: the value being traversed and how it was reached.
#[derive(Debug, Clone, Default)]
pub struct ValueFrame {
    pub value: Value,

    /// Key, index or set member the value was reached by.
    pub name: Value,

    /// Position within the enclosing iteration.
    pub position: usize,
}

impl Reset for ValueFrame {
    fn reset(&mut self) {
        self.value = Value::Null;
        self.name = Value::Null;
        self.position = 0;
    }
}

/// Variables bound while one scope owner was active.
#[derive(Debug)]
struct VariableScope {
    owner: usize,
    vars: FxHashMap<String, Value>,
}

pub struct ValueScope {
    frames: ContextPool<ValueFrame>,
    variables: Vec<VariableScope>,

    /// Nesting depth of scope owners (open elements and loop-body calls).
    owner: usize,

    methods: FxHashMap<String, Method>,
}

impl ValueScope {
    /// Create a scope with the default method table.
    pub fn new() -> Self {
        Self {
            frames: ContextPool::new(),
            variables: Vec::new(),
            owner: 0,
            methods: methods::defaults(),
        }
    }

    /// Register a top-level method, replacing a default of the same name.
    pub fn register_method(
        &mut self,
        name: impl Into<String>,
        method: impl Fn(&ValueFrame, &[Value]) -> RenderResult<Value> + 'static,
    ) {
        self.methods.insert(name.into(), Rc::new(method));
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Push a Value Context.
    pub fn enter(&mut self, value: Value, name: Value, position: usize) {
        let frame = self.frames.acquire();
        frame.value = value;
        frame.name = name;
        frame.position = position;
    }

    /// Pop the innermost Value Context.
    pub fn exit(&mut self) {
        self.frames.release();
    }

    /// Run `f` with a Value Context pushed, popping it on every exit path.
    pub fn scoped<R>(
        &mut self,
        value: Value,
        name: Value,
        position: usize,
        f: impl FnOnce(&mut Self) -> RenderResult<R>,
    ) -> RenderResult<R> {
        self.enter(value, name, position);
        let result = f(self);
        self.exit();
        result
    }

    pub fn current(&self) -> Option<&ValueFrame> {
        self.frames.current()
    }

    /// The current value, or null outside of any Value Context.
    pub fn value(&self) -> Value {
        self.current().map(|f| f.value.clone()).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Start a new variable-scope owner (an element was opened or a loop
    /// body is about to run).
    pub fn enter_owner(&mut self) {
        self.owner += 1;
    }

    /// End the innermost owner, discarding the variables it bound.
    pub fn exit_owner(&mut self) {
        while self
            .variables
            .last()
            .is_some_and(|scope| scope.owner >= self.owner)
        {
            self.variables.pop();
        }
        self.owner = self.owner.saturating_sub(1);
    }

    /// Bind a variable in the scope of the innermost owner, shadowing outer
    /// bindings of the same name.
    pub fn variable(&mut self, name: impl Into<String>, value: Value) {
        match self.variables.last_mut() {
            Some(scope) if scope.owner == self.owner => {
                scope.vars.insert(name.into(), value);
            }
            _ => {
                let mut vars = FxHashMap::default();
                vars.insert(name.into(), value);
                self.variables.push(VariableScope {
                    owner: self.owner,
                    vars,
                });
            }
        }
    }

    /// Look a variable up through the enclosing scopes. Unbound names are null.
    pub fn lookup(&self, name: &str) -> Value {
        self.variables
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every Value Context and variable (end or abort of a pass).
    pub fn clear(&mut self) {
        self.frames.release_all();
        self.variables.clear();
        self.owner = 0;
    }

    /// Invoke a top-level method against the current Value Context.
    pub fn call_method(&self, name: &str, args: &[Value]) -> RenderResult<Value> {
        let method = self
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::UnknownMethod {
                name: name.to_string(),
            })?;
        let frame = self.current().cloned().unwrap_or_default();
        method(&frame, args)
    }

    /// Resolve an access path against the current value.
    ///
    /// The first token may be `self`, a `$variable`, or a call to a
    /// registered top-level method; the rest resolve through the Value
    /// Resolver. A multi-value result is collapsed before it is returned.
    pub fn get(&mut self, tokens: &[Token]) -> RenderResult<Value> {
        let mut rest = tokens;
        let mut value = self.value();

        match tokens.first() {
            Some(Token::SelfRef) => rest = &tokens[1..],
            Some(Token::Variable(name)) => {
                value = self.lookup(name);
                rest = &tokens[1..];
            }
            Some(Token::Call(name, args)) if self.has_method(name) => {
                value = self.call_method(name, args)?;
                rest = &tokens[1..];
            }
            _ => {}
        }

        for token in rest {
            if value.is_null() {
                break;
            }
            value = self.resolve(&value, token)?;
        }

        Ok(match value {
            Value::Collection(c) => c.value_of(),
            other => other,
        })
    }

    fn resolve(&mut self, obj: &Value, token: &Token) -> RenderResult<Value> {
        let mut call = |predicate: &Predicate, value: &Value, name: &Value, position: usize| {
            self.scoped(value.clone(), name.clone(), position, |scope| {
                predicate.test(scope)
            })
        };

        match token {
            Token::Attribute(name) => resolver::get_attribute(obj, name, &mut call),
            other => resolver::get(obj, other, &mut call),
        }
    }
}

impl Default for ValueScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueScope")
            .field("depth", &self.frames.depth())
            .field("owner", &self.owner)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}
