//! Bounded output buffer.

use std::collections::VecDeque;

/// Number of entries kept per stream for each job.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 20;

/// Fixed-capacity FIFO of captured output.
///
/// Once full, pushing a new entry evicts the oldest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl OutputBuffer {
    /// Create an empty buffer keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a buffer seeded with existing entries, keeping only the newest
    /// `capacity` of them.
    pub fn from_entries(entries: impl IntoIterator<Item = String>, capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        for entry in entries {
            buffer.push(entry);
        }
        buffer
    }

    /// Append an entry, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_back(entry.into());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Copy out all entries, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_CAPACITY)
    }
}
