//! Fixed-capacity ring buffer of feed records.

use serde::{Deserialize, Serialize};

use crate::persistence::PersistedFeedings;

/// One admitted feed. A slot with `rotations == 0` has never been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub as_of_adjusted_sec: u64,
    pub rotations: u32,
}

impl FeedEvent {
    pub fn new(as_of_adjusted_sec: u64, rotations: u32) -> Self {
        Self {
            as_of_adjusted_sec,
            rotations,
        }
    }

    pub fn is_written(&self) -> bool {
        self.rotations != 0
    }
}

/// Ring buffer of `FeedEvent`s; the oldest record is overwritten once full.
///
/// `cursor` is the slot the next record goes to and is always `< capacity`.
#[derive(Debug, Clone)]
pub struct FeedingStore {
    slots: Vec<FeedEvent>,
    cursor: usize,
}

impl FeedingStore {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "history capacity must be > 0");
        Self {
            slots: vec![FeedEvent::default(); capacity.max(1)],
            cursor: 0,
        }
    }

    /// Write `event` at the cursor and advance it. Returns the slot written.
    pub fn add_feeding(&mut self, event: FeedEvent) -> usize {
        let index = self.cursor;
        self.slots[index] = event;
        self.cursor = (index + 1) % self.slots.len();
        index
    }

    /// Raw slots in storage order, unwritten ones included.
    pub fn feedings(&self) -> &[FeedEvent] {
        &self.slots
    }

    /// Written records, newest `as_of` first. The store itself is untouched.
    pub fn sorted_by_as_of(&self) -> Vec<FeedEvent> {
        let mut out: Vec<FeedEvent> = self
            .slots
            .iter()
            .copied()
            .filter(FeedEvent::is_written)
            .collect();
        out.sort_by(|a, b| b.as_of_adjusted_sec.cmp(&a.as_of_adjusted_sec));
        out
    }

    /// Most recently added record, if any.
    pub fn latest(&self) -> Option<FeedEvent> {
        let len = self.slots.len();
        let last = self.slots[(self.cursor + len - 1) % len];
        last.is_written().then_some(last)
    }

    pub fn written(&self) -> usize {
        self.slots.iter().filter(|e| e.is_written()).count()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Out-of-range values reset the cursor to 0.
    pub fn update_cursor(&mut self, cursor: usize) {
        if cursor < self.slots.len() {
            self.cursor = cursor;
        } else {
            tracing::warn!(
                cursor,
                capacity = self.slots.len(),
                "persisted cursor out of range; resetting to 0"
            );
            self.cursor = 0;
        }
    }

    /// Replace contents with a persisted image. Slots past `capacity` are
    /// dropped and missing ones stay unwritten.
    pub fn restore(&mut self, image: &PersistedFeedings) {
        let capacity = self.slots.len();
        if image.slots.len() > capacity {
            tracing::warn!(
                persisted = image.slots.len(),
                capacity,
                "persisted history larger than capacity; truncating"
            );
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = image.slots.get(i).copied().unwrap_or_default();
        }
        self.update_cursor(image.cursor);
    }

    pub fn snapshot(&self) -> PersistedFeedings {
        PersistedFeedings {
            cursor: self.cursor,
            slots: self.slots.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_wraps_to_last_slot() {
        let mut store = FeedingStore::new(2);
        assert_eq!(store.latest(), None);
        store.add_feeding(FeedEvent::new(10, 1));
        store.add_feeding(FeedEvent::new(20, 2));
        assert_eq!(store.cursor(), 0);
        assert_eq!(store.latest(), Some(FeedEvent::new(20, 2)));
    }
}
