//! Dialer state module
//!
//! Provides the digit buffer and call flag (`DialState`), number
//! formatting, and the dialer task that applies commands with two states:
//! - Idle: digits can be entered, deleted and cleared
//! - InCall: entry is ignored until the call is ended

mod dial;
mod format;
mod machine;

pub use machine::{Command, Dialer, DialerHandle, Envelope, Snapshot};
