/*
 * model.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Reactive key/value store.
//!
//! A [`DataModel`] keeps insertion-ordered values and notifies subscribers
//! whenever a value actually changes. Every notified key also gets a new
//! update token, which templates can use as a cheap change indicator.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use webcomp_render::{Value, ValueMap};

static NEXT_TOKEN_PREFIX: AtomicU64 = AtomicU64::new(1);

/// One change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: String,
    pub value: Value,
    pub previous: Value,
}

pub type Listener = Rc<dyn Fn(&Change)>;

/// Handle returned by [`DataModel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,

    /// `None` subscribes to every key.
    key: Option<String>,
    listener: Listener,
}

pub struct DataModel {
    token_prefix: u64,
    data: ValueMap,
    update_tokens: IndexMap<String, u64>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
}

impl DataModel {
    pub fn new() -> Self {
        Self {
            token_prefix: NEXT_TOKEN_PREFIX.fetch_add(1, Ordering::Relaxed),
            data: ValueMap::new(),
            update_tokens: IndexMap::new(),
            subscribers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Create a model holding `entries`. No notifications are sent.
    pub fn with_data<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut model = Self::new();
        model.data = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        model
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Value stored under `key`, or null.
    pub fn get(&self, key: &str) -> Value {
        self.data.get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Store `value` under `key`.
    ///
    /// Nothing happens when the stored value is already equal to `value`.
    /// Otherwise subscribers are notified unless `silent` is set. Returns
    /// whether the value changed.
    pub fn set(&mut self, key: impl Into<String>, value: Value, silent: bool) -> bool {
        let key = key.into();
        if self.data.get(&key) == Some(&value) {
            return false;
        }

        let previous = self
            .data
            .insert(key.clone(), value.clone())
            .unwrap_or_default();
        if !silent {
            self.notify(Change {
                key,
                value,
                previous,
            });
        }
        true
    }

    /// Remove `key`, notifying subscribers with a null value.
    pub fn delete(&mut self, key: &str) -> bool {
        let Some(previous) = self.data.shift_remove(key) else {
            return false;
        };
        self.notify(Change {
            key: key.to_string(),
            value: Value::Null,
            previous,
        });
        self.update_tokens.shift_remove(key);
        true
    }

    /// Remove every key, one notification per key.
    pub fn clear(&mut self) {
        for key in self.keys() {
            self.delete(&key);
        }
    }

    /// Subscribe to changes of one key.
    pub fn subscribe(
        &mut self,
        key: impl Into<String>,
        listener: impl Fn(&Change) + 'static,
    ) -> SubscriptionId {
        self.add_subscriber(Some(key.into()), Rc::new(listener))
    }

    /// Subscribe to changes of any key.
    pub fn subscribe_all(&mut self, listener: impl Fn(&Change) + 'static) -> SubscriptionId {
        self.add_subscriber(None, Rc::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Token identifying the current revision of `key`: `"<model>.<n>"`,
    /// where `n` counts the notifications sent for the key.
    pub fn update_token(&self, key: &str) -> String {
        let revision = self.update_tokens.get(key).copied().unwrap_or(0);
        format!("{}.{}", self.token_prefix, revision)
    }

    /// First key whose value equals `value`.
    pub fn key_for_value(&self, value: &Value) -> Option<String> {
        self.data
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(k, _)| k.clone())
    }

    /// All values as a map value.
    pub fn to_value(&self) -> Value {
        Value::Map(Rc::new(self.data.clone()))
    }

    /// Drop every subscriber, then every value (without notifications).
    pub fn dispose(&mut self) {
        self.subscribers.clear();
        self.data.clear();
        self.update_tokens.clear();
    }

    fn add_subscriber(&mut self, key: Option<String>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, key, listener });
        id
    }

    fn notify(&mut self, change: Change) {
        *self.update_tokens.entry(change.key.clone()).or_insert(0) += 1;

        // Key subscribers first, then global ones
        let keyed = self
            .subscribers
            .iter()
            .filter(|s| s.key.as_deref() == Some(change.key.as_str()));
        let global = self.subscribers.iter().filter(|s| s.key.is_none());
        let listeners: Vec<Listener> = keyed.chain(global).map(|s| Rc::clone(&s.listener)).collect();

        tracing::trace!(key = %change.key, listeners = listeners.len(), "model changed");
        for listener in listeners {
            listener(&change);
        }
    }
}

impl Default for DataModel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModel")
            .field("data", &self.data)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
