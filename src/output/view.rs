//! Output view contract and an in-memory implementation.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

/// One entry appended to the console output.
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    /// Echo of a submitted command line.
    Input(String),
    /// Plain trace line.
    Line(String),
    /// Backend text appended verbatim.
    Raw(String),
    /// Structured value, rendered expandable by rich views.
    Value(Value),
    /// Error entry with a banner and detail text.
    Error { banner: String, detail: String },
}

impl Renderable {
    /// Check if this is an error entry.
    pub fn is_error(&self) -> bool {
        matches!(self, Renderable::Error { .. })
    }
}

impl fmt::Display for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderable::Input(line) => write!(f, "> {}", line),
            Renderable::Line(text) | Renderable::Raw(text) => f.write_str(text),
            Renderable::Value(Value::String(s)) => write!(f, "\"{}\"", s),
            Renderable::Value(value) => write!(f, "{}", value),
            Renderable::Error { banner, detail } => write!(f, "{} {}", banner, detail),
        }
    }
}

/// Surface the console writes into.
///
/// Rendering, expansion of structured values, window chrome and scroll
/// animation live behind this trait.
pub trait OutputView: Send {
    /// Append one entry.
    fn append(&mut self, item: Renderable);

    /// Remove all entries.
    fn clear(&mut self);

    /// Remember whether the view is currently scrolled to the bottom.
    fn note_position(&mut self);

    /// Re-layout and scroll to the bottom if forced or if the bottom was
    /// noted. `None` duration means the view's default animation.
    fn refresh_scroll(&mut self, force_bottom: bool, duration: Option<Duration>);

    /// Visible height in view units, used to size scroll steps.
    fn view_height(&self) -> f64 {
        0.0
    }

    /// Pan the view. Relative moves add to the current offset.
    fn scroll_to(&mut self, _left: f64, _top: f64, _relative: bool) {}

    /// Current `(left, top)` scroll offset.
    fn scroll_position(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
}

/// Scroll bookkeeping kept by [`MemoryView`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollState {
    pub left: f64,
    pub top: f64,
    pub bottom_noted: bool,
    pub forced_refreshes: usize,
}

#[derive(Debug, Default)]
struct Recorded {
    entries: Vec<Renderable>,
    scroll: ScrollState,
}

/// View that records everything appended to it.
///
/// Used by embedders without a screen and by tests. [`MemoryView::transcript`]
/// returns a reader that stays valid after the view is moved into the console.
#[derive(Debug, Clone)]
pub struct MemoryView {
    recorded: Arc<Mutex<Recorded>>,
    height: f64,
}

impl MemoryView {
    /// Create a new empty view with a nominal height of 400 units.
    pub fn new() -> Self {
        Self::with_height(400.0)
    }

    /// Create a view with a specific height.
    pub fn with_height(height: f64) -> Self {
        Self {
            recorded: Arc::default(),
            height,
        }
    }

    /// Get a reader over the recorded entries.
    pub fn transcript(&self) -> Transcript {
        Transcript {
            recorded: Arc::clone(&self.recorded),
        }
    }
}

impl Default for MemoryView {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputView for MemoryView {
    fn append(&mut self, item: Renderable) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.entries.push(item);
        }
    }

    fn clear(&mut self) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.entries.clear();
        }
    }

    fn note_position(&mut self) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.scroll.bottom_noted = true;
        }
    }

    fn refresh_scroll(&mut self, force_bottom: bool, _duration: Option<Duration>) {
        if let Ok(mut recorded) = self.recorded.lock() {
            if force_bottom {
                recorded.scroll.forced_refreshes += 1;
            }
            recorded.scroll.bottom_noted = false;
        }
    }

    fn view_height(&self) -> f64 {
        self.height
    }

    fn scroll_to(&mut self, left: f64, top: f64, relative: bool) {
        if let Ok(mut recorded) = self.recorded.lock() {
            if relative {
                recorded.scroll.left += left;
                recorded.scroll.top += top;
            } else {
                recorded.scroll.left = left;
                recorded.scroll.top = top;
            }
        }
    }

    fn scroll_position(&self) -> (f64, f64) {
        self.recorded
            .lock()
            .map(|r| (r.scroll.left, r.scroll.top))
            .unwrap_or_default()
    }
}

/// Read handle over a [`MemoryView`].
#[derive(Debug, Clone)]
pub struct Transcript {
    recorded: Arc<Mutex<Recorded>>,
}

impl Transcript {
    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<Renderable> {
        self.recorded
            .lock()
            .map(|r| r.entries.clone())
            .unwrap_or_default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.recorded.lock().map(|r| r.entries.len()).unwrap_or(0)
    }

    /// Check if no entries were recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries rendered as text, one per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(ToString::to_string).collect()
    }

    /// Error entries only.
    pub fn errors(&self) -> Vec<Renderable> {
        self.entries().into_iter().filter(Renderable::is_error).collect()
    }

    /// Current scroll bookkeeping.
    pub fn scroll(&self) -> ScrollState {
        self.recorded.lock().map(|r| r.scroll).unwrap_or_default()
    }

    /// Drop recorded entries, keeping scroll state.
    pub fn reset(&self) {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.entries.clear();
        }
    }
}
