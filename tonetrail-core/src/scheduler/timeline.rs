//! Min-heap of cancellable deferred payloads, keyed by virtual milliseconds.

use super::CancelToken;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    due_ms: u64,
    /// Insertion order, breaks ties between equal deadlines
    seq: u64,
    token: CancelToken,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior (earliest first)
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct Timeline<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, due_ms: u64, token: CancelToken, payload: T) {
        self.heap.push(Entry {
            due_ms,
            seq: self.next_seq,
            token,
            payload,
        });
        self.next_seq += 1;
    }

    fn discard_cancelled(&mut self) {
        while self
            .heap
            .peek()
            .is_some_and(|entry| entry.token.is_cancelled())
        {
            self.heap.pop();
        }
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.heap.peek().map(|entry| entry.due_ms)
    }

    /// Remove and return the earliest live entry due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(u64, T)> {
        self.discard_cancelled();
        if self.heap.peek()?.due_ms > now_ms {
            return None;
        }
        self.heap.pop().map(|entry| (entry.due_ms, entry.payload))
    }

    pub fn clear(&mut self) {
        for entry in self.heap.drain() {
            entry.token.cancel();
        }
    }

    /// Entries still queued, including cancelled ones not yet discarded.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
