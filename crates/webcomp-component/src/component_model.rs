/*
 * component_model.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Typed component attributes.
//!
//! A [`ComponentModel`] is a [`DataModel`] whose keys are declared up front
//! with a [`ValueType`]. Values written to it are cast to the declared type.
//! A few base attributes (`class`, `id`, `style`, `slot`, `data-*`,
//! `on-*`) are accepted without a declaration and stored as strings.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use webcomp_render::{RenderError, Value};

use crate::model::DataModel;

static BASE_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:class|id|style|slot|(?:data|on)-[\w-]+)$").expect("valid regex"));

/// Errors raised by typed component models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unsupported type \"{type_name}\" in \"{key}\" model key")]
    UnsupportedType { type_name: String, key: String },

    #[error("The \"{key}\" attribute is not defined in component model")]
    UndefinedAttribute { key: String },

    #[error("Invalid JSON in \"{key}\" attribute: {source}")]
    InvalidJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ModelError> for RenderError {
    fn from(err: ModelError) -> Self {
        RenderError::template(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Json,
    #[default]
    Any,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Json => "json",
            ValueType::Any => "any",
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ValueType::String),
            "number" => Ok(ValueType::Number),
            "boolean" => Ok(ValueType::Boolean),
            "json" => Ok(ValueType::Json),
            "any" => Ok(ValueType::Any),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text form of a value for casting: null is the empty string.
fn cast_text(value: &Value) -> String {
    value.to_text()
}

/// Cast `value` to `value_type`.
///
/// - string: the value's text
/// - number: booleans become 1/0, anything else is parsed from its text
/// - boolean: booleans pass; `"0"`, `"false"`, `"no"` and `""` are false,
///   any other text is true
/// - json: text is parsed (empty text is null); other values pass
/// - any: passes unchanged
pub fn cast_value(value: Value, value_type: ValueType) -> Result<Value, serde_json::Error> {
    Ok(match value_type {
        ValueType::String => Value::String(cast_text(&value)),
        ValueType::Number => match value {
            Value::Bool(b) => Value::from(if b { 1 } else { 0 }),
            other => Value::Number(Value::String(cast_text(&other)).to_number()),
        },
        ValueType::Boolean => match value {
            Value::Bool(b) => Value::Bool(b),
            other => {
                let text = cast_text(&other);
                Value::Bool(!matches!(text.as_str(), "0" | "false" | "no" | ""))
            }
        },
        ValueType::Json => match value {
            Value::String(s) if s.is_empty() => Value::Null,
            Value::String(s) => Value::from(serde_json::from_str::<serde_json::Value>(&s)?),
            other => other,
        },
        ValueType::Any => value,
    })
}

/// Declared type and default value of one model key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDefinition {
    pub value_type: ValueType,
    pub default: Value,
}

impl KeyDefinition {
    /// Declare a key, casting `default` to `value_type`.
    pub fn new(key: &str, value_type: ValueType, default: Value) -> Result<Self, ModelError> {
        let default = cast_value(default, value_type).map_err(|source| ModelError::InvalidJson {
            key: key.to_string(),
            source,
        })?;
        Ok(Self { value_type, default })
    }
}

pub struct ComponentModel {
    definition: IndexMap<String, KeyDefinition>,
    data: DataModel,
}

impl ComponentModel {
    pub fn new(definition: IndexMap<String, KeyDefinition>) -> Self {
        Self {
            definition,
            data: DataModel::new(),
        }
    }

    /// Read a definition of the form
    /// `{"key": {"type": "number", "value": "1"}, ...}`.
    ///
    /// A missing type is `any`; the default value is cast to the type.
    pub fn from_json(source: &serde_json::Value) -> Result<Self, ModelError> {
        let mut definition = IndexMap::new();
        if let Some(entries) = source.as_object() {
            for (key, entry) in entries {
                let type_name = entry
                    .get("type")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("any");
                let value_type = type_name
                    .parse::<ValueType>()
                    .map_err(|type_name| ModelError::UnsupportedType {
                        type_name,
                        key: key.clone(),
                    })?;
                let default = entry.get("value").cloned().map(Value::from).unwrap_or_default();
                definition.insert(key.clone(), KeyDefinition::new(key, value_type, default)?);
            }
        }
        Ok(Self::new(definition))
    }

    /// Set initial values. Subscribers are notified as usual.
    pub fn with_data<K: AsRef<str>>(
        mut self,
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Self, ModelError> {
        for (key, value) in entries {
            self.set(key.as_ref(), value, false)?;
        }
        Ok(self)
    }

    /// Declared keys, in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.definition.keys().cloned().collect()
    }

    /// Whether `key` is declared or is a base attribute.
    pub fn supports(&self, key: &str) -> bool {
        self.definition.contains_key(key) || BASE_ATTRIBUTE.is_match(key)
    }

    /// Type of `key`. Undeclared base attributes are strings.
    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        if !self.supports(key) {
            return None;
        }
        Some(
            self.definition
                .get(key)
                .map_or(ValueType::String, |d| d.value_type),
        )
    }

    /// Current value of `key`, falling back to the declared default.
    pub fn get(&self, key: &str) -> Result<Value, ModelError> {
        if !self.supports(key) {
            return Err(undefined(key));
        }
        if self.data.has(key) {
            return Ok(self.data.get(key));
        }
        Ok(self
            .definition
            .get(key)
            .map(|d| d.default.clone())
            .unwrap_or_default())
    }

    /// Cast and store `value`. Returns whether the stored value changed.
    pub fn set(&mut self, key: &str, value: Value, silent: bool) -> Result<bool, ModelError> {
        let value_type = self.value_type(key).ok_or_else(|| undefined(key))?;
        let value = cast_value(value, value_type).map_err(|source| ModelError::InvalidJson {
            key: key.to_string(),
            source,
        })?;
        Ok(self.data.set(key, value, silent))
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.data.delete(key)
    }

    pub fn data(&self) -> &DataModel {
        &self.data
    }

    /// The underlying store, for subscriptions.
    pub fn data_mut(&mut self) -> &mut DataModel {
        &mut self.data
    }

    pub fn dispose(&mut self) {
        self.definition.clear();
        self.data.dispose();
    }
}

impl Default for ComponentModel {
    fn default() -> Self {
        Self::new(IndexMap::new())
    }
}

impl fmt::Debug for ComponentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentModel")
            .field("definition", &self.definition)
            .field("data", &self.data)
            .finish()
    }
}

fn undefined(key: &str) -> ModelError {
    ModelError::UndefinedAttribute {
        key: key.to_string(),
    }
}
