//! Min-heap of pending expiries.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::time::Instant;

/// A scheduled eviction of `key`, valid only while the entry still carries `stamp`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Expiry {
    pub at: Instant,
    pub stamp: u64,
    pub key: String,
}

/// Earliest-first queue of expiries.
///
/// Replacing or deleting an entry does not touch the heap; the stale expiry is
/// recognised by its stamp when it is popped and discarded.
#[derive(Debug, Default)]
pub(crate) struct ExpiryQueue {
    heap: BinaryHeap<Reverse<Expiry>>,
}

impl ExpiryQueue {
    pub fn push(&mut self, expiry: Expiry) {
        self.heap.push(Reverse(expiry));
    }

    /// Deadline of the earliest scheduled expiry, stale or not.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(e)| e.at)
    }

    /// Pops the earliest expiry if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Expiry> {
        match self.heap.peek() {
            Some(Reverse(e)) if e.at <= now => self.heap.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Rebuilds the heap from the expiries that are still live.
    pub fn rebuild(&mut self, live: impl IntoIterator<Item = Expiry>) {
        self.heap = live.into_iter().map(Reverse).collect();
    }
}
