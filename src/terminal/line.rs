//! Line capture state machine.
//!
//! Every keystroke is looked up in [`transition`], which maps the current
//! state (and whether the buffer is empty) to the next state plus the action to
//! perform. The editor applies the action to its buffer and reports a
//! [`LineEffect`] that the surface mirrors on the display.

use thiserror::Error;

/// Decoded keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character.
    Char(char),
    /// Delete the previous character.
    Backspace,
    /// Commit the line.
    Enter,
    /// Anything else (arrows, function keys, control bytes).
    Other,
}

/// Capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// No capture requested.
    Idle,
    /// Collecting keystrokes for the outstanding request.
    Composing,
    /// The last capture was committed; a new one may begin.
    Committed,
}

/// What the display must do in response to a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEffect {
    /// Nothing visible happens.
    None,
    /// Show the character.
    Echo(char),
    /// Remove the last shown character.
    Erase,
    /// Break the line; the request resolves with the given text.
    Commit(String),
}

/// Errors raised by the capture state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// `begin` while another capture is composing.
    #[error("a line capture is already in progress")]
    AlreadyComposing,
    /// The request was dropped before a line was committed.
    #[error("line capture aborted before a line was entered")]
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Ignore,
    Append,
    RemoveLast,
    Commit,
}

fn transition(state: LineState, key: Key, empty: bool) -> (LineState, Action) {
    use LineState::*;
    match (state, key) {
        (Composing, Key::Char(_)) => (Composing, Action::Append),
        (Composing, Key::Backspace) if empty => (Composing, Action::Ignore),
        (Composing, Key::Backspace) => (Composing, Action::RemoveLast),
        (Composing, Key::Enter) => (Committed, Action::Commit),
        (Composing, Key::Other) => (Composing, Action::Ignore),
        (Idle, _) => (Idle, Action::Ignore),
        (Committed, _) => (Committed, Action::Ignore),
    }
}

/// Buffer plus state for a single line capture.
#[derive(Debug)]
pub struct LineEditor {
    state: LineState,
    buffer: String,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    /// Create an idle editor.
    pub fn new() -> Self {
        Self {
            state: LineState::Idle,
            buffer: String::new(),
        }
    }

    /// Start composing a new line.
    pub fn begin(&mut self) -> Result<(), LineError> {
        if self.state == LineState::Composing {
            return Err(LineError::AlreadyComposing);
        }
        self.state = LineState::Composing;
        self.buffer.clear();
        Ok(())
    }

    /// Feed one keystroke.
    pub fn apply(&mut self, key: Key) -> LineEffect {
        let (next, action) = transition(self.state, key, self.buffer.is_empty());
        self.state = next;
        match (action, key) {
            (Action::Append, Key::Char(ch)) => {
                self.buffer.push(ch);
                LineEffect::Echo(ch)
            }
            (Action::RemoveLast, _) => {
                self.buffer.pop();
                LineEffect::Erase
            }
            (Action::Commit, _) => LineEffect::Commit(std::mem::take(&mut self.buffer)),
            _ => LineEffect::None,
        }
    }

    /// Abandon the current capture. Returns whether one was composing.
    pub fn abort(&mut self) -> bool {
        let was_composing = self.state == LineState::Composing;
        self.state = LineState::Idle;
        self.buffer.clear();
        was_composing
    }

    /// Current state.
    pub fn state(&self) -> LineState {
        self.state
    }

    /// Text typed so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_and_commits() {
        let mut editor = LineEditor::new();
        editor.begin().unwrap();
        assert_eq!(editor.apply(Key::Char('a')), LineEffect::Echo('a'));
        assert_eq!(editor.apply(Key::Char('b')), LineEffect::Echo('b'));
        assert_eq!(editor.apply(Key::Backspace), LineEffect::Erase);
        assert_eq!(editor.apply(Key::Char('c')), LineEffect::Echo('c'));
        assert_eq!(editor.apply(Key::Other), LineEffect::None);
        assert_eq!(editor.apply(Key::Enter), LineEffect::Commit("ac".into()));
        assert_eq!(editor.state(), LineState::Committed);
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn backspace_on_empty_buffer_is_a_no_op() {
        let mut editor = LineEditor::new();
        editor.begin().unwrap();
        assert_eq!(editor.apply(Key::Backspace), LineEffect::None);
        assert_eq!(editor.state(), LineState::Composing);
    }

    #[test]
    fn keys_are_ignored_unless_composing() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.apply(Key::Char('x')), LineEffect::None);
        assert_eq!(editor.apply(Key::Enter), LineEffect::None);
        editor.begin().unwrap();
        editor.apply(Key::Enter);
        assert_eq!(editor.apply(Key::Char('y')), LineEffect::None);
        assert_eq!(editor.state(), LineState::Committed);
    }

    #[test]
    fn only_one_capture_composes_at_a_time() {
        let mut editor = LineEditor::new();
        editor.begin().unwrap();
        assert_eq!(editor.begin(), Err(LineError::AlreadyComposing));
        assert!(editor.abort());
        assert!(!editor.abort());
        editor.begin().unwrap();
    }
}
