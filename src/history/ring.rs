//! Bounded, persisted command ring.

use tracing::debug;

use crate::session::Persistence;

fn slot_key(index: usize) -> String {
    format!("hist{}", index)
}

/// Circular log of submitted commands.
///
/// Slot `i` is persisted under `<prefix>hist<i>`. The write cursor points at
/// the most recently written slot; the next write goes to `cursor + 1`
/// (mod capacity), overwriting the oldest entry once the ring is full.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    slots: Vec<Option<String>>,
    cursor: Option<usize>,
}

impl HistoryStore {
    /// Create an empty ring with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: None,
        }
    }

    /// Load slots from storage.
    ///
    /// `stored_cursor` is the persisted write cursor, `-1` meaning nothing
    /// was ever written. It is normalised modulo the capacity.
    pub fn load(persistence: &Persistence, capacity: usize, stored_cursor: i64) -> Self {
        let mut store = Self::new(capacity);
        let capacity = store.capacity();
        for (i, slot) in store.slots.iter_mut().enumerate() {
            *slot = persistence.get(&slot_key(i));
        }
        store.cursor = usize::try_from(stored_cursor)
            .ok()
            .map(|c| c % capacity);
        debug!(capacity, cursor = ?store.cursor, live = store.len(), "history loaded");
        store
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the most recently written slot.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Value stored at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.slots.get(index)?.as_deref()
    }

    /// Check if slot `index` holds a value.
    pub fn has(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Append a command, persisting the slot it lands in.
    ///
    /// Returns the new write cursor; the caller persists it with the settings.
    pub fn push(&mut self, persistence: &mut Persistence, command: &str) -> usize {
        let next = self.cursor.map_or(0, |c| (c + 1) % self.capacity());
        self.slots[next] = Some(command.to_string());
        self.cursor = Some(next);
        persistence.set(&slot_key(next), command);
        next
    }

    /// Live entries, oldest first.
    pub fn entries_oldest_first(&self) -> Vec<String> {
        let start = self.cursor.map_or(0, |c| c + 1);
        let capacity = self.capacity();
        (0..capacity)
            .map(|offset| (start + offset) % capacity)
            .filter_map(|i| self.slots[i].clone())
            .collect()
    }
}
