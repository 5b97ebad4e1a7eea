//! Command history.
//!
//! - [`HistoryStore`]: the bounded ring persisted slot by slot
//! - [`HistoryBrowser`]: up/down browse cursor for the input line
//! - [`HistoryPicker`]: the newest-first pick list shown to the user

mod browse;
mod picker;
mod ring;

pub use browse::HistoryBrowser;
pub use picker::HistoryPicker;
pub use ring::HistoryStore;
