//! Up/down browsing over the history ring.

use super::HistoryStore;

/// Browse cursor for the input line.
///
/// Not browsing until the first `up`. While browsing, the text that was in
/// the input before browsing started is kept so `down` past the newest
/// entry can put it back.
#[derive(Debug, Clone, Default)]
pub struct HistoryBrowser {
    position: Option<usize>,
    cached_input: String,
}

impl HistoryBrowser {
    /// Create a browser that is not browsing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a history entry is currently shown.
    pub fn is_browsing(&self) -> bool {
        self.position.is_some()
    }

    /// Slot currently shown.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Stop browsing without restoring anything.
    pub fn reset(&mut self) {
        self.position = None;
        self.cached_input.clear();
    }

    /// Step toward older entries.
    ///
    /// Returns the text to place in the input, or `None` when nothing
    /// changes: no history, or the oldest entry is already shown.
    pub fn up(&mut self, store: &HistoryStore, current_input: &str) -> Option<String> {
        match self.position {
            None => {
                let newest = store.cursor()?;
                let value = store.get(newest)?.to_string();
                self.cached_input = current_input.to_string();
                self.position = Some(newest);
                Some(value)
            }
            Some(position) => {
                let older = if position == 0 {
                    store.capacity() - 1
                } else {
                    position - 1
                };
                // A full ring would otherwise wrap from the oldest entry back to the newest.
                if Some(older) == store.cursor() {
                    return None;
                }
                let value = store.get(older)?.to_string();
                self.position = Some(older);
                Some(value)
            }
        }
    }

    /// Step toward newer entries.
    ///
    /// Past the newest entry browsing stops and the cached input is
    /// returned. Returns `None` when not browsing.
    pub fn down(&mut self, store: &HistoryStore) -> Option<String> {
        let position = self.position?;
        if Some(position) == store.cursor() {
            self.position = None;
            return Some(std::mem::take(&mut self.cached_input));
        }
        let newer = (position + 1) % store.capacity();
        self.position = Some(newer);
        Some(store.get(newer).unwrap_or_default().to_string())
    }
}
