/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Positional Render Cache.
//!
//! A singly linked list of cache slots, each identified by the hash of the
//! template call site that produced it, with a cursor that walks the list
//! during a render pass. Slots live in an arena and link to each other by
//! index; index 0 is the tip, a sentinel that is never exposed.
//!
//! During a pass every call site calls [`RenderCache::enter`] with its hash.
//! A hit moves the cursor onto the matching slot; a miss is followed by
//! [`RenderCache::insert`]. Slots the pass never reached are evicted by
//! [`RenderCache::trim`] at the end.
//!
//! Two lookahead strategies exist:
//!
//! - **Sequential**: hashes are expected in ascending order. Slots with a
//!   smaller hash than the requested one are evicted on the way; the scan
//!   stops at the first slot with a larger or equal hash.
//! - **Non-sequential**: for arbitrary keys. The scan goes all the way; when
//!   the key is found further down, the skipped slots are unlinked. Unlinked
//!   slots are parked until the end of the pass: a later non-sequential
//!   `enter` for one of them splices it back at the cursor, and whatever is
//!   still parked when the pass ends is disposed.

use std::fmt;

/// Identity of a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Int(n) => write!(f, "{n}"),
            CacheKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i32> for CacheKey {
    fn from(n: i32) -> Self {
        CacheKey::Int(i64::from(n))
    }
}

impl From<i64> for CacheKey {
    fn from(n: i64) -> Self {
        CacheKey::Int(n)
    }
}

impl From<u32> for CacheKey {
    fn from(n: u32) -> Self {
        CacheKey::Int(i64::from(n))
    }
}

impl From<usize> for CacheKey {
    fn from(n: usize) -> Self {
        CacheKey::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Str(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Str(s)
    }
}

/// Payloads stored in a cache know how to release what they own.
pub trait Dispose {
    fn dispose(&mut self);
}

/// Payloads that may hold a nested cache.
pub trait Nested: Sized {
    fn as_cache_mut(&mut self) -> Option<&mut RenderCache<Self>>;
}

const TIP: usize = 0;

#[derive(Debug)]
struct Slot<T> {
    key: Option<CacheKey>,
    value: Option<T>,
    next: Option<usize>,
}

impl<T> Slot<T> {
    fn tip() -> Self {
        Slot {
            key: None,
            value: None,
            next: None,
        }
    }
}

#[derive(Debug)]
pub struct RenderCache<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    parked: Vec<usize>,
    current: usize,
}

impl<T: Dispose> RenderCache<T> {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::tip()],
            free: Vec::new(),
            parked: Vec::new(),
            current: TIP,
        }
    }

    /// Key of the slot right after the cursor.
    pub fn next_key(&self) -> Option<&CacheKey> {
        self.slots[self.current]
            .next
            .and_then(|next| self.slots[next].key.as_ref())
    }

    /// Move the cursor onto the slot identified by `key`.
    ///
    /// Returns `false` when no such slot could be reached; the caller is
    /// then expected to [`insert`](Self::insert).
    pub fn enter(&mut self, key: &CacheKey, sequential: bool) -> bool {
        if self.advance(key) {
            return true;
        }

        if sequential {
            while let Some(next) = self.slots[self.current].next {
                match &self.slots[next].key {
                    Some(k) if k < key => {
                        self.slots[self.current].next = self.slots[next].next;
                        self.release(next);
                    }
                    _ => break,
                }
            }
            return self.advance(key);
        }

        let mut skipped = Vec::new();
        let mut cursor = self.slots[self.current].next;
        while let Some(index) = cursor {
            if self.slots[index].key.as_ref() == Some(key) {
                break;
            }
            skipped.push(index);
            cursor = self.slots[index].next;
        }

        if let Some(found) = cursor {
            self.slots[self.current].next = Some(found);
            tracing::trace!(key = %key, skipped = skipped.len(), "reordered cache slot");
            self.parked.extend(skipped);
            return self.advance(key);
        }

        // Not in the list: maybe it was skipped earlier in this pass
        if let Some(pos) = self
            .parked
            .iter()
            .position(|&index| self.slots[index].key.as_ref() == Some(key))
        {
            let index = self.parked.swap_remove(pos);
            self.slots[index].next = self.slots[self.current].next;
            self.slots[self.current].next = Some(index);
            self.current = index;
            return true;
        }

        false
    }

    /// Splice a new slot holding `value` in after the cursor and move the
    /// cursor onto it.
    ///
    /// Keys need not be unique: a second slot with the key of the one under
    /// the cursor is linked in after it, and the next pass meets both in
    /// order.
    pub fn insert(&mut self, key: CacheKey, value: T) {
        let next = self.slots[self.current].next;
        let slot = Slot {
            key: Some(key),
            value: Some(value),
            next,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.slots[self.current].next = Some(index);
        self.current = index;
    }

    /// Dispose the value under the cursor and store `value` instead.
    pub fn replace_current(&mut self, value: T) {
        if let Some(mut old) = self.slots[self.current].value.replace(value) {
            old.dispose();
        }
    }

    /// Evict every slot after the cursor, and every parked slot.
    pub fn trim(&mut self) {
        while let Some(next) = self.slots[self.current].next {
            self.slots[self.current].next = self.slots[next].next;
            self.release(next);
        }
        for index in std::mem::take(&mut self.parked) {
            self.release(index);
        }
    }

    /// Move the cursor back to the tip.
    pub fn reset(&mut self) {
        self.current = TIP;
    }

    /// End of pass: trim, then reset.
    pub fn finalize(&mut self) {
        self.trim();
        self.reset();
    }

    /// Dispose every slot in the cache.
    pub fn dispose(&mut self) {
        self.reset();
        self.trim();
        self.slots.truncate(1);
        self.slots[TIP].next = None;
        self.free.clear();
    }

    pub fn current(&self) -> Option<&T> {
        self.slots[self.current].value.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.slots[self.current].value.as_mut()
    }

    /// Arena index of the slot under the cursor. Stable until the slot is
    /// evicted.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn value_at(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.value.as_ref())
    }

    pub fn value_at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(|slot| slot.value.as_mut())
    }

    /// Keys in list order, excluding the tip.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = Vec::new();
        let mut cursor = self.slots[TIP].next;
        while let Some(index) = cursor {
            if let Some(key) = &self.slots[index].key {
                keys.push(key.clone());
            }
            cursor = self.slots[index].next;
        }
        keys
    }

    /// Number of live slots, excluding the tip.
    pub fn len(&self) -> usize {
        self.slots.len() - 1 - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follow a path of slot indices through nested caches. `None` when a
    /// step of the path is not a nested cache.
    pub fn descend(&mut self, path: &[usize]) -> Option<&mut Self>
    where
        T: Nested,
    {
        match path.split_first() {
            None => Some(self),
            Some((&index, rest)) => self
                .slots
                .get_mut(index)?
                .value
                .as_mut()
                .and_then(T::as_cache_mut)?
                .descend(rest),
        }
    }

    fn advance(&mut self, key: &CacheKey) -> bool {
        match self.slots[self.current].next {
            Some(next) if self.slots[next].key.as_ref() == Some(key) => {
                self.current = next;
                true
            }
            _ => false,
        }
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        tracing::trace!(key = ?slot.key, "evicted cache slot");
        if let Some(mut value) = slot.value.take() {
            value.dispose();
        }
        slot.key = None;
        slot.next = None;
        self.free.push(index);
    }
}

impl<T: Dispose> Default for RenderCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
