//! Priority ordering store with bounded capacity.
//!
//! `PriorityStore` is a generic min-first heap: the ordering comes from a key
//! function supplied at construction, so stored items carry no ordering logic
//! of their own. The scheduler stores `(key, TaskId)` pairs keyed by
//! `(priority, created_at, sequence)`.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use crate::error::{Result, VigilError};

type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;

/// Heap entry ordered only by its precomputed key.
struct Entry<T, K> {
    key: K,
    item: T,
}

impl<T, K: Ord> PartialEq for Entry<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T, K: Ord> Eq for Entry<T, K> {}

impl<T, K: Ord> PartialOrd for Entry<T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, K: Ord> Ord for Entry<T, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// A priority container yielding the item with the *smallest* key first.
pub struct PriorityStore<T, K: Ord> {
    heap: BinaryHeap<Reverse<Entry<T, K>>>,
    key_fn: KeyFn<T, K>,
    /// Maximum number of entries accepted by `push` (0 = unlimited)
    max_size: usize,
}

impl<T, K: Ord> PriorityStore<T, K> {
    /// Create a store ordered by `key_fn`, rejecting pushes beyond `max_size`.
    pub fn new<F>(max_size: usize, key_fn: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            heap: BinaryHeap::new(),
            key_fn: Box::new(key_fn),
            max_size,
        }
    }

    /// Create an unbounded store.
    pub fn unbounded<F>(key_fn: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(0, key_fn)
    }

    /// Insert an item, or fail with `QueueFull` at capacity.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(VigilError::queue_full(self.max_size));
        }
        self.push_unbounded(item);
        Ok(())
    }

    /// Insert an item ignoring the capacity bound.
    ///
    /// Reserved for work that was already admitted once (retries).
    pub fn push_unbounded(&mut self, item: T) {
        let key = (self.key_fn)(&item);
        self.heap.push(Reverse(Entry { key, item }));
    }

    /// Remove and return the item with the smallest key.
    pub fn pop_highest(&mut self) -> Option<T> {
        self.heap.pop().map(|Reverse(entry)| entry.item)
    }

    /// Look at the next item without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(entry)| &entry.item)
    }

    /// Remove every item matching `pred`, returning how many were removed.
    pub fn remove_where<P>(&mut self, mut pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let before = self.heap.len();
        self.heap.retain(|Reverse(entry)| !pred(&entry.item));
        before - self.heap.len()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.max_size > 0 && self.heap.len() >= self.max_size
    }

    /// Configured capacity (0 = unlimited).
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<T, K: Ord> fmt::Debug for PriorityStore<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityStore")
            .field("len", &self.heap.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}
