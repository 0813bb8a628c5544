//! Keypad characters and key bindings
//!
//! Maps keyboard keys and stdin tokens onto dialer commands.

use crate::state::Command;

/// Characters present on the keypad
pub const KEYPAD_CHARS: [char; 12] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '*', '0', '#'];

/// A single keypad character: `0-9`, `*` or `#`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digit(char);

impl Digit {
    pub fn new(c: char) -> Option<Self> {
        KEYPAD_CHARS.contains(&c).then_some(Self(c))
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl TryFrom<char> for Digit {
    type Error = KeyError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::new(c).ok_or(KeyError::NotOnKeypad(c))
    }
}

impl std::fmt::Display for Digit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from interpreting keypad input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("'{0}' is not a keypad key")]
    NotOnKeypad(char),

    #[error("unrecognized keypad input: {0}")]
    UnknownToken(String),
}

/// A key press the dialer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Keypad character (plays the key tone)
    Digit(Digit),
    /// Remove the last character
    Backspace,
    /// Place the call
    Enter,
    /// Clear the buffer
    Escape,
}

impl KeyAction {
    /// Resolve a keyboard key name such as `"7"`, `"Backspace"` or `"Enter"`
    pub fn from_key_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Digit::new(c).map(KeyAction::Digit);
        }

        match name.to_ascii_lowercase().as_str() {
            "backspace" => Some(KeyAction::Backspace),
            "enter" | "return" => Some(KeyAction::Enter),
            "escape" | "esc" => Some(KeyAction::Escape),
            _ => None,
        }
    }

    pub fn into_command(self) -> Command {
        match self {
            KeyAction::Digit(digit) => Command::Press(digit),
            KeyAction::Backspace => Command::Delete,
            KeyAction::Enter => Command::StartCall,
            KeyAction::Escape => Command::Clear,
        }
    }
}

/// Parse one line of keypad input into commands.
///
/// Accepts key names (`enter`, `backspace`, `escape`), action words
/// (`call`, `hangup`, `sms`, `mms`, `clear`, `delete`), `number <text>`
/// to replace the buffer, or a run of keypad characters pressed in order.
pub fn parse_line(line: &str) -> Result<Vec<Command>, KeyError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "number" => Some(Command::SetNumber(rest.to_string())),
        "call" => Some(Command::StartCall),
        "hangup" | "end" => Some(Command::EndCall),
        "sms" => Some(Command::SendSms),
        "mms" => Some(Command::SendMms),
        "clear" => Some(Command::Clear),
        "delete" | "del" => Some(Command::Delete),
        _ => None,
    };
    if let Some(command) = command {
        return Ok(vec![command]);
    }

    if let Some(action) = KeyAction::from_key_name(line) {
        return Ok(vec![action.into_command()]);
    }

    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            Digit::new(c)
                .map(Command::Press)
                .ok_or_else(|| KeyError::UnknownToken(line.to_string()))
        })
        .collect()
}
