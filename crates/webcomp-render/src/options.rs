/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Renderer configuration.
//!
//! Options can be built in code or deserialized from JSON using kebab-case
//! keys:
//!
//! ```json
//! { "allow-slots": true, "slot-element": "slot", "event-prefix": "on" }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RenderOptions {
    /// Whether children of the render root may be placed into the root's
    /// named content slots.
    pub allow_slots: bool,

    /// Element name that stands for one of the render root's own content
    /// slots.
    pub slot_element: String,

    /// Attribute prefix marking event bindings (`on-click`) and inline event
    /// properties (`onclick`).
    pub event_prefix: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            allow_slots: false,
            slot_element: "slot".to_string(),
            event_prefix: "on".to_string(),
        }
    }
}

impl RenderOptions {
    pub fn with_allow_slots(mut self, allow: bool) -> Self {
        self.allow_slots = allow;
        self
    }

    /// Parse options from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
