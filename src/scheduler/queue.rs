//! Pending queue of due jobs.

use std::collections::VecDeque;

/// FIFO of job indices waiting for admission.
///
/// An index appears at most once. Membership is a linear scan; fleets are
/// small enough that a side index would not pay for itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PendingQueue {
    items: VecDeque<usize>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.items.iter().any(|&i| i == index)
    }

    /// Append an index. Returns false if it was already queued.
    pub fn push(&mut self, index: usize) -> bool {
        if self.contains(index) {
            return false;
        }
        self.items.push_back(index);
        true
    }

    /// Remove and return up to `n` indices from the front.
    pub fn take_front(&mut self, n: usize) -> Vec<usize> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
