//! # Event History
//!
//! Fixed-capacity circular log of the most recently dispatched events, used
//! only to let reconnecting clients catch up.
//!
//! ## Layout
//!
//! Storage is a `Vec` that grows until it reaches `capacity`, plus a write
//! cursor. While filling, the cursor stays at zero and the vector is already
//! in insertion order. Once full, `cursor` is the oldest slot and the next
//! one to be overwritten, so chronological order is `buf[cursor..]` followed
//! by `buf[..cursor]`.
//!
//! ## Concurrency
//!
//! A single `RwLock` guards the ring. Readers always copy out a complete
//! snapshot, so a reader never observes a partially written entry.

use parking_lot::RwLock;
use shared_types::Event;
use std::sync::Arc;

struct Ring {
    buffer: Vec<Arc<Event>>,
    cursor: usize,
}

impl Ring {
    fn ordered(&self) -> Vec<Arc<Event>> {
        let mut out = Vec::with_capacity(self.buffer.len());
        out.extend(self.buffer[self.cursor..].iter().cloned());
        out.extend(self.buffer[..self.cursor].iter().cloned());
        out
    }
}

/// Bounded, chronologically ordered replay window.
pub struct EventHistory {
    capacity: usize,
    ring: RwLock<Ring>,
}

impl EventHistory {
    /// Create an empty history. A capacity of zero retains nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ring: RwLock::new(Ring {
                buffer: Vec::with_capacity(capacity),
                cursor: 0,
            }),
        }
    }

    /// Append an event, overwriting the oldest one once full. O(1).
    pub fn add(&self, event: Arc<Event>) {
        if self.capacity == 0 {
            return;
        }

        let mut ring = self.ring.write();
        if ring.buffer.len() < self.capacity {
            ring.buffer.push(event);
        } else {
            let cursor = ring.cursor;
            ring.buffer[cursor] = event;
            ring.cursor = (cursor + 1) % self.capacity;
        }
    }

    /// All retained events, oldest first.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<Event>> {
        self.ring.read().ordered()
    }

    /// Events strictly after `last_event_id`.
    ///
    /// An empty id returns everything. An id that is no longer (or never
    /// was) in the window returns nothing: there is no fallback to a full
    /// replay, so a client that fell out of the window misses the gap.
    #[must_use]
    pub fn get_since(&self, last_event_id: &str) -> Vec<Arc<Event>> {
        let all = self.get_all();
        if last_event_id.is_empty() {
            return all;
        }

        match all.iter().position(|event| event.id == last_event_id) {
            Some(index) => all[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Number of retained events.
    #[must_use]
    pub fn size(&self) -> usize {
        self.ring.read().buffer.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained event.
    pub fn clear(&self) {
        let mut ring = self.ring.write();
        ring.buffer.clear();
        ring.cursor = 0;
    }
}
