//! Digit buffer and call flag
//!
//! `DialState` is the only mutable dialer state. Editing is gated on the
//! call flag: while a call is active every entry operation is a silent
//! no-op. Each mutator reports whether it changed anything.

use crate::keypad::Digit;

use super::format::{format_number, DEFAULT_DESTINATION};

/// The two phases of the dialer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Digits can be edited
    #[default]
    Idle,
    /// A simulated call is in progress
    InCall,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::InCall => write!(f, "InCall"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialState {
    digits: String,
    call_active: bool,
}

impl DialState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw buffer contents
    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn is_call_active(&self) -> bool {
        self.call_active
    }

    pub fn state(&self) -> State {
        if self.call_active {
            State::InCall
        } else {
            State::Idle
        }
    }

    pub fn append_digit(&mut self, digit: Digit) -> bool {
        if self.call_active {
            return false;
        }
        self.digits.push(digit.as_char());
        true
    }

    pub fn delete_last(&mut self) -> bool {
        if self.call_active {
            return false;
        }
        self.digits.pop().is_some()
    }

    pub fn clear(&mut self) -> bool {
        if self.call_active || self.digits.is_empty() {
            return false;
        }
        self.digits.clear();
        true
    }

    /// Replace the whole buffer, as typed into the number field
    pub fn set_number(&mut self, number: &str) -> bool {
        if self.call_active || self.digits == number {
            return false;
        }
        self.digits = number.to_string();
        true
    }

    /// Enter `InCall`. Returns false if a call was already active.
    pub fn start_call(&mut self) -> bool {
        if self.call_active {
            return false;
        }
        self.call_active = true;
        true
    }

    /// Leave `InCall` unconditionally. Returns whether a call was active.
    pub fn end_call(&mut self) -> bool {
        std::mem::replace(&mut self.call_active, false)
    }

    /// Formatted display string for the current buffer
    pub fn format(&self) -> String {
        format_number(&self.digits)
    }

    /// Number an action should target, falling back to the default contact
    pub fn destination(&self) -> &str {
        if self.digits.is_empty() {
            DEFAULT_DESTINATION
        } else {
            &self.digits
        }
    }

    /// Whether the call action should be offered
    pub fn call_enabled(&self) -> bool {
        !self.digits.is_empty() || self.call_active
    }
}
