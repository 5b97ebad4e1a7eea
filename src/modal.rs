//! Keyboard-driven input state machine.
//!
//! The controller is either editing the input line ([`Mode::Idle`]) or
//! capturing arrow keys for an interactive geometry command
//! ([`Mode::AwaitingDirectional`]). It never touches geometry or output
//! itself; every key yields a [`ModalAction`] for the console to apply.

use crate::history::{HistoryBrowser, HistoryStore};

/// Shift multiplier while the accelerator (shift) is held.
pub const ACCELERATION: f64 = 5.0;

/// What an interactive directional session adjusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Move,
    Resize,
    Scroll,
}

impl Purpose {
    /// Confirmation traced when the session ends.
    pub fn exit_message(self) -> &'static str {
        match self {
            Purpose::Move => "Move command exit.",
            Purpose::Resize => "Size command exit.",
            Purpose::Scroll => "Scroll command exit.",
        }
    }

    /// Instructions traced when the session starts.
    pub fn usage(self) -> &'static str {
        match self {
            Purpose::Move => {
                "Use the arrow keys to move the window.\n\
                 Hold shift to move further.\n\
                 Press enter to exit command."
            }
            Purpose::Resize => {
                "Use the arrow keys to resize the window.\n\
                 Hold shift for a larger change in size.\n\
                 Press enter to exit command."
            }
            Purpose::Scroll => {
                "Use the arrow keys to scroll the window.\n\
                 Hold shift to scroll faster.\n\
                 Press enter to exit command."
            }
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingDirectional { purpose: Purpose, unit: f64 },
}

/// Keys the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Enter,
    Esc,
    Tab,
}

/// A key press with its modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub code: KeyCode,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(code: KeyCode) -> Self {
        Self { code, shift: false }
    }

    pub fn shifted(code: KeyCode) -> Self {
        Self { code, shift: true }
    }
}

impl From<KeyCode> for KeyInput {
    fn from(code: KeyCode) -> Self {
        Self::new(code)
    }
}

/// Result of feeding one key to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalAction {
    /// Nothing to do.
    None,
    /// The input line changed.
    Edited,
    /// A non-empty line was submitted.
    Submit(String),
    /// Apply a directional shift.
    Shift { purpose: Purpose, dx: f64, dy: f64 },
    /// The directional session ended.
    Exit(Purpose),
}

/// Input line editor, history browser, and directional capture.
#[derive(Debug, Default)]
pub struct ModalInputController {
    mode: Mode,
    input: String,
    caret: usize,
    browser: HistoryBrowser,
}

impl ModalInputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current input line.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Caret position, in characters.
    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Replace the input line, leaving the caret at the end.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.caret = self.input.chars().count();
    }

    /// Check if a history entry is shown in the input.
    pub fn is_browsing(&self) -> bool {
        self.browser.is_browsing()
    }

    /// Leave history browsing without touching the input.
    pub fn reset_browsing(&mut self) {
        self.browser.reset();
    }

    /// Start capturing arrow keys. Replaces any session already running.
    pub fn begin(&mut self, purpose: Purpose, unit: f64) -> Option<Purpose> {
        let previous = match self.mode {
            Mode::AwaitingDirectional { purpose, .. } => Some(purpose),
            Mode::Idle => None,
        };
        self.mode = Mode::AwaitingDirectional { purpose, unit };
        previous
    }

    /// Feed one key.
    pub fn handle_key(&mut self, key: KeyInput, history: &HistoryStore) -> ModalAction {
        match self.mode {
            Mode::AwaitingDirectional { purpose, unit } => self.directional(key, purpose, unit),
            Mode::Idle => self.idle(key, history),
        }
    }

    fn directional(&mut self, key: KeyInput, purpose: Purpose, unit: f64) -> ModalAction {
        let amount = if key.shift { unit * ACCELERATION } else { unit };
        let (dx, dy) = match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Idle;
                return ModalAction::Exit(purpose);
            }
            KeyCode::Left => (-amount, 0.0),
            KeyCode::Right => (amount, 0.0),
            KeyCode::Up => (0.0, -amount),
            KeyCode::Down => (0.0, amount),
            _ => return ModalAction::None,
        };
        ModalAction::Shift { purpose, dx, dy }
    }

    fn byte_index(&self, caret: usize) -> usize {
        self.input
            .char_indices()
            .nth(caret)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn idle(&mut self, key: KeyInput, history: &HistoryStore) -> ModalAction {
        match key.code {
            KeyCode::Enter => {
                let line = self.input.trim().to_string();
                if line.is_empty() {
                    return ModalAction::None;
                }
                self.set_input(String::new());
                self.browser.reset();
                ModalAction::Submit(line)
            }
            KeyCode::Up => match self.browser.up(history, &self.input) {
                Some(text) => {
                    self.set_input(text);
                    ModalAction::Edited
                }
                None => ModalAction::None,
            },
            KeyCode::Down => match self.browser.down(history) {
                Some(text) => {
                    self.set_input(text);
                    ModalAction::Edited
                }
                None => ModalAction::None,
            },
            KeyCode::Char(c) => {
                let at = self.byte_index(self.caret);
                self.input.insert(at, c);
                self.caret += 1;
                ModalAction::Edited
            }
            KeyCode::Backspace if self.caret > 0 => {
                self.caret -= 1;
                let at = self.byte_index(self.caret);
                self.input.remove(at);
                ModalAction::Edited
            }
            KeyCode::Delete if self.caret < self.input.chars().count() => {
                let at = self.byte_index(self.caret);
                self.input.remove(at);
                ModalAction::Edited
            }
            KeyCode::Left if self.caret > 0 => {
                self.caret -= 1;
                ModalAction::Edited
            }
            KeyCode::Right if self.caret < self.input.chars().count() => {
                self.caret += 1;
                ModalAction::Edited
            }
            KeyCode::Home => {
                self.caret = 0;
                ModalAction::Edited
            }
            KeyCode::End => {
                self.caret = self.input.chars().count();
                ModalAction::Edited
            }
            _ => ModalAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemoryView, Output};
    use crate::session::Persistence;
    use crate::storage::MemoryStorage;

    fn history(commands: &[&str]) -> HistoryStore {
        let mut p = Persistence::new(
            Box::new(MemoryStorage::new()),
            "t_",
            Output::new(MemoryView::new()),
        );
        let mut ring = HistoryStore::new(10);
        for cmd in commands {
            ring.push(&mut p, cmd);
        }
        ring
    }

    fn type_text(ctl: &mut ModalInputController, text: &str, history: &HistoryStore) {
        for c in text.chars() {
            ctl.handle_key(KeyCode::Char(c).into(), history);
        }
    }

    #[test]
    fn test_submit_trims_and_clears() {
        let h = history(&[]);
        let mut ctl = ModalInputController::new();
        type_text(&mut ctl, "  .cls ", &h);
        assert_eq!(
            ctl.handle_key(KeyCode::Enter.into(), &h),
            ModalAction::Submit(".cls".into())
        );
        assert_eq!(ctl.input(), "");
    }

    #[test]
    fn test_empty_enter_is_ignored() {
        let h = history(&[]);
        let mut ctl = ModalInputController::new();
        type_text(&mut ctl, "   ", &h);
        assert_eq!(ctl.handle_key(KeyCode::Enter.into(), &h), ModalAction::None);
    }

    #[test]
    fn test_line_editing() {
        let h = history(&[]);
        let mut ctl = ModalInputController::new();
        type_text(&mut ctl, "ac", &h);
        ctl.handle_key(KeyCode::Left.into(), &h);
        type_text(&mut ctl, "b", &h);
        assert_eq!(ctl.input(), "abc");
        ctl.handle_key(KeyCode::Home.into(), &h);
        ctl.handle_key(KeyCode::Delete.into(), &h);
        ctl.handle_key(KeyCode::End.into(), &h);
        ctl.handle_key(KeyCode::Backspace.into(), &h);
        assert_eq!(ctl.input(), "b");
        assert_eq!(ctl.caret(), 1);
    }

    #[test]
    fn test_history_browse_restores_input() {
        let h = history(&["one", "two"]);
        let mut ctl = ModalInputController::new();
        type_text(&mut ctl, "dra", &h);
        ctl.handle_key(KeyCode::Up.into(), &h);
        assert_eq!(ctl.input(), "two");
        ctl.handle_key(KeyCode::Down.into(), &h);
        assert_eq!(ctl.input(), "dra");
        assert!(!ctl.is_browsing());
    }

    #[test]
    fn test_submit_resets_browsing() {
        let h = history(&["one"]);
        let mut ctl = ModalInputController::new();
        ctl.handle_key(KeyCode::Up.into(), &h);
        assert!(ctl.is_browsing());
        ctl.handle_key(KeyCode::Enter.into(), &h);
        assert!(!ctl.is_browsing());
    }

    #[test]
    fn test_directional_shifts_and_exit() {
        let h = history(&[]);
        let mut ctl = ModalInputController::new();
        ctl.begin(Purpose::Move, 5.0);
        assert_eq!(
            ctl.handle_key(KeyCode::Left.into(), &h),
            ModalAction::Shift { purpose: Purpose::Move, dx: -5.0, dy: 0.0 }
        );
        assert_eq!(
            ctl.handle_key(KeyInput::shifted(KeyCode::Down), &h),
            ModalAction::Shift { purpose: Purpose::Move, dx: 0.0, dy: 25.0 }
        );
        assert_eq!(ctl.handle_key(KeyCode::Char('x').into(), &h), ModalAction::None);
        assert_eq!(ctl.input(), "");
        assert_eq!(
            ctl.handle_key(KeyCode::Enter.into(), &h),
            ModalAction::Exit(Purpose::Move)
        );
        assert_eq!(ctl.mode(), Mode::Idle);
    }

    #[test]
    fn test_begin_replaces_session() {
        let mut ctl = ModalInputController::new();
        assert_eq!(ctl.begin(Purpose::Move, 5.0), None);
        assert_eq!(ctl.begin(Purpose::Scroll, 80.0), Some(Purpose::Move));
        assert_eq!(
            ctl.mode(),
            Mode::AwaitingDirectional { purpose: Purpose::Scroll, unit: 80.0 }
        );
    }
}
