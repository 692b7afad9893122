//! Capacity-bounded log history.
//!
//! Each applied tick may produce one log entry. The buffer keeps entries
//! in arrival order and evicts the oldest once the configured capacity is
//! reached, so a long-running visualization holds a fixed-size window of
//! recent history.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Upper bound on the storage reserved up front, regardless of capacity.
const MAX_PREALLOCATED: usize = 1024;

/// Insertion-ordered ring of the most recent log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer<L> {
    entries: VecDeque<L>,
    capacity: NonZeroUsize,
}

impl<L> LogBuffer<L> {
    /// Create an empty buffer holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.get().min(MAX_PREALLOCATED)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one if the buffer is full.
    ///
    /// Returns the evicted entry, if any.
    pub fn push(&mut self, entry: L) -> Option<L> {
        let evicted = if self.entries.len() >= self.capacity.get() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained.
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Most recently pushed entry.
    pub fn latest(&self) -> Option<&L> {
        self.entries.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.entries.iter()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<L: Clone> LogBuffer<L> {
    /// Copy the entries out, oldest first.
    pub fn to_vec(&self) -> Vec<L> {
        self.entries.iter().cloned().collect()
    }
}
