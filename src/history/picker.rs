//! Visible history pick list.

use std::collections::VecDeque;

/// Recently submitted commands, newest first, bounded by the ring capacity.
#[derive(Debug, Clone)]
pub struct HistoryPicker {
    entries: VecDeque<String>,
    limit: usize,
}

impl HistoryPicker {
    /// Create an empty list holding at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Rebuild from entries listed oldest first.
    pub fn from_oldest_first(entries: Vec<String>, limit: usize) -> Self {
        let mut picker = Self::new(limit);
        for entry in entries {
            picker.push(entry);
        }
        picker
    }

    /// Add a newly submitted command at the front, trimming the tail.
    pub fn push(&mut self, command: impl Into<String>) {
        self.entries.push_front(command.into());
        self.entries.truncate(self.limit);
    }

    /// Change the limit, trimming if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.entries.truncate(self.limit);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Entry at `index` (0 is the newest).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_trimmed() {
        let mut picker = HistoryPicker::new(2);
        picker.push("a");
        picker.push("b");
        picker.push("c");
        assert_eq!(picker.entries().collect::<Vec<_>>(), vec!["c", "b"]);
        assert_eq!(picker.get(1), Some("b"));
    }

    #[test]
    fn test_rebuild_from_oldest_first() {
        let picker = HistoryPicker::from_oldest_first(vec!["x".into(), "y".into()], 10);
        assert_eq!(picker.get(0), Some("y"));
        assert_eq!(picker.len(), 2);
    }
}
