//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::DialerEvent;
use crate::state::{Command, Snapshot};

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current dialer status
    GetStatus,

    /// Press a keypad key (`0-9`, `*`, `#`)
    Press { key: char },

    /// Remove the last character
    Delete,

    /// Clear the number
    Clear,

    /// Replace the number with free text
    SetNumber { number: String },

    /// Place a call
    Call,

    /// End the call
    Hangup,

    SendSms,

    SendMms,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to dialer event notifications
    Subscribe,
}

impl Request {
    /// The dialer command for requests that act on dialer state
    pub fn command(&self) -> Option<Command> {
        match self {
            Request::Delete => Some(Command::Delete),
            Request::Clear => Some(Command::Clear),
            Request::SetNumber { number } => Some(Command::SetNumber(number.clone())),
            Request::Call => Some(Command::StartCall),
            Request::Hangup => Some(Command::EndCall),
            Request::SendSms => Some(Command::SendSms),
            Request::SendMms => Some(Command::SendMms),
            Request::GetStatus | Request::Press { .. } | Request::Ping | Request::Subscribe => None,
        }
    }
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current dialer status
    Status(DialerStatus),

    /// Command applied; snapshot after it ran
    Ack(Snapshot),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Event { event: DialerEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Full dialer status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerStatus {
    /// Daemon version
    pub version: String,

    /// Current display and call state
    pub dialer: Snapshot,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DialerStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            dialer: Snapshot::default(),
            uptime_secs: 0,
        }
    }
}
