/// Label recorded for a newline, both typed and expected
pub const ENTER: &str = "enter";
/// Label recorded for a space, both typed and expected
pub const SPACE: &str = "space";
/// Label recorded for a backspace press; its expected label is always empty
pub const BACKSPACE: &str = "backspace";

/// A single keystroke delivered to a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Rune(char),
    Space,
    Enter,
    Backspace,
    Interrupt,
}

impl Key {
    /// The character this key appends to the typed buffer, if any
    pub fn as_char(&self) -> Option<char> {
        match self {
            Key::Rune(c) => Some(*c),
            Key::Space => Some(' '),
            Key::Enter => Some('\n'),
            Key::Backspace | Key::Interrupt => None,
        }
    }

    /// Canonical label used in the event log. Interrupts are never logged.
    pub fn label(&self) -> Option<String> {
        match self {
            Key::Backspace => Some(BACKSPACE.to_string()),
            Key::Interrupt => None,
            _ => self.as_char().map(label_for_char),
        }
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        match c {
            ' ' => Key::Space,
            '\n' => Key::Enter,
            c => Key::Rune(c),
        }
    }
}

/// Maps a character onto the label space shared by the session and the metrics.
///
/// Metrics compare labels, not characters, so `'\n'` typed and `'\n'` expected
/// must both come out as `"enter"`.
pub fn label_for_char(c: char) -> String {
    match c {
        '\n' => ENTER.to_string(),
        ' ' => SPACE.to_string(),
        c => c.to_string(),
    }
}

/// Space or tab. Newlines are deliberately not included.
pub fn is_indent(c: char) -> bool {
    c == ' ' || c == '\t'
}
