/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for render passes.

use thiserror::Error;

/// Errors that can abort a render pass.
///
/// Cache operations never fail; every error here originates from template
/// execution (value access, method calls, event handlers) and propagates
/// out of the pass unchanged.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A global method token named a method that is not registered.
    #[error("Unknown method: {name}")]
    UnknownMethod { name: String },

    /// A call token targeted a value that has no such method.
    #[error("Value of type {type_name} has no callable method '{method}'")]
    NotCallable { method: String, type_name: String },

    /// Error raised by template code itself.
    #[error("Template error: {message}")]
    Template { message: String },

    /// Error raised by an event handler.
    #[error("Error in '{event}' handler: {message}")]
    Handler { event: String, message: String },

    /// A component was asked to render or dispose from inside its own pass.
    #[error("{component} is already rendering")]
    Reentrant { component: String },

    /// Error annotated with the component that was rendering when it occurred.
    #[error("Error while rendering of {component} component:\n{source}")]
    Component {
        component: String,
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Shorthand for a [`RenderError::Template`] error.
    pub fn template(message: impl Into<String>) -> Self {
        RenderError::Template {
            message: message.into(),
        }
    }

    /// Annotate this error with the tag name of the component being rendered.
    ///
    /// Only the first component boundary an error crosses is recorded; an
    /// already annotated error is returned unchanged.
    pub fn in_component(self, component: impl Into<String>) -> Self {
        match self {
            RenderError::Component { .. } => self,
            other => RenderError::Component {
                component: component.into(),
                source: Box::new(other),
            },
        }
    }

    /// Tag name of the component this error was annotated with, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            RenderError::Component { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
