//! Keypad module for dialer input
//!
//! Validates keypad characters and reads key presses from a line-oriented
//! input stream for driving the dialer.

mod keys;
mod listener;

pub use keys::Digit;
pub use listener::KeypadListener;
