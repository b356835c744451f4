/*
 * pool.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Depth-indexed pool for transient, strictly nested contexts.
//!
//! Render Contexts and Value Contexts are acquired when a scope is entered
//! and released when it is left, always in LIFO order. The pool keeps one
//! slot per nesting depth and resets a slot when it is released, so a pass
//! allocates only when it nests deeper than any pass before it.

/// Contexts stored in a [`ContextPool`] are cleared before reuse.
pub trait Reset {
    fn reset(&mut self);
}

#[derive(Debug)]
pub struct ContextPool<T> {
    frames: Vec<T>,
    depth: usize,
}

impl<T: Default + Reset> ContextPool<T> {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            depth: 0,
        }
    }

    /// Acquire the slot for the next nesting level.
    pub fn acquire(&mut self) -> &mut T {
        if self.depth == self.frames.len() {
            self.frames.push(T::default());
        }
        let frame = &mut self.frames[self.depth];
        self.depth += 1;
        frame
    }

    /// Release the innermost slot, resetting it for reuse.
    pub fn release(&mut self) {
        debug_assert!(self.depth > 0, "release without matching acquire");
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        self.frames[self.depth].reset();
    }

    /// Release every active slot (used when a pass is abandoned).
    pub fn release_all(&mut self) {
        while self.depth > 0 {
            self.release();
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of slots ever allocated: the deepest nesting seen so far.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.depth.checked_sub(1).map(|i| &self.frames[i])
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.depth.checked_sub(1).map(|i| &mut self.frames[i])
    }

    /// The slot enclosing the innermost one.
    pub fn parent_mut(&mut self) -> Option<&mut T> {
        self.depth.checked_sub(2).map(|i| &mut self.frames[i])
    }

    /// Active slots, innermost first.
    pub fn active(&self) -> impl Iterator<Item = &T> {
        self.frames[..self.depth].iter().rev()
    }
}

impl<T: Default + Reset> Default for ContextPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Frame {
        label: Option<&'static str>,
    }

    impl Reset for Frame {
        fn reset(&mut self) {
            self.label = None;
        }
    }

    #[test]
    fn test_slots_are_reused_per_depth() {
        let mut pool: ContextPool<Frame> = ContextPool::new();

        pool.acquire().label = Some("outer");
        pool.acquire().label = Some("inner");
        assert_eq!(pool.depth(), 2);
        assert_eq!(pool.current().and_then(|f| f.label), Some("inner"));
        assert_eq!(pool.parent_mut().and_then(|f| f.label), Some("outer"));

        pool.release();
        pool.release();
        assert_eq!(pool.depth(), 0);

        // Second pass of the same depth allocates nothing new
        pool.acquire();
        pool.acquire();
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_release_resets_frame() {
        let mut pool: ContextPool<Frame> = ContextPool::new();
        pool.acquire().label = Some("stale");
        pool.release();

        assert_eq!(pool.acquire().label, None);
    }

    #[test]
    fn test_active_is_innermost_first() {
        let mut pool: ContextPool<Frame> = ContextPool::new();
        pool.acquire().label = Some("a");
        pool.acquire().label = Some("b");

        let labels: Vec<_> = pool.active().map(|f| f.label).collect();
        assert_eq!(labels, vec![Some("b"), Some("a")]);

        pool.release_all();
        assert_eq!(pool.depth(), 0);
        assert!(pool.current().is_none());
    }
}
