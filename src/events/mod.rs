//! Events module for dialer output
//!
//! Everything the presentation layer reacts to goes out as a
//! `DialerEvent` on the broadcast bus: display updates, call progress,
//! key tones and toast notifications.

use serde::{Deserialize, Serialize};

use crate::notify::{Toast, ToastPhase};
use crate::state::Snapshot;

/// Events emitted by the dialer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialerEvent {
    /// Display, call flag or call status changed
    DisplayChanged(Snapshot),

    /// A keypad character was pressed (plays even mid-call)
    KeyTone { key: char },

    /// Call placed, now connecting
    CallStarted {
        /// Raw number being called
        destination: String,
    },

    /// Connect delay elapsed while the call was still up
    CallConnected,

    /// Call hung up (also emitted when no call was active)
    CallEnded {
        /// Milliseconds since the call started, 0 if none was active
        duration_ms: u64,
    },

    /// A toast was posted
    Toast(Toast),

    /// A posted toast moved to its next phase
    ToastLifecycle { id: u64, phase: ToastPhase },
}

impl std::fmt::Display for DialerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialerEvent::DisplayChanged(snapshot) => {
                write!(f, "DISPLAY_CHANGED ({})", snapshot.display)
            }
            DialerEvent::KeyTone { key } => write!(f, "KEY_TONE ({})", key),
            DialerEvent::CallStarted { destination } => {
                write!(f, "CALL_STARTED ({})", destination)
            }
            DialerEvent::CallConnected => write!(f, "CALL_CONNECTED"),
            DialerEvent::CallEnded { duration_ms } => {
                write!(f, "CALL_ENDED ({}ms)", duration_ms)
            }
            DialerEvent::Toast(toast) => {
                write!(f, "TOAST #{} [{}] {}", toast.id, toast.level, toast.message)
            }
            DialerEvent::ToastLifecycle { id, phase } => {
                write!(f, "TOAST #{} {:?}", id, phase)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastLevel;

    #[test]
    fn test_event_serialization() {
        let event = DialerEvent::CallEnded { duration_ms: 1500 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("call_ended"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"call_connected"}"#;
        let event: DialerEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, DialerEvent::CallConnected));
    }

    #[test]
    fn test_toast_event_shape() {
        let event = DialerEvent::Toast(Toast {
            id: 3,
            message: "Call initiated".to_string(),
            level: ToastLevel::Success,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "toast");
        assert_eq!(value["id"], 3);
        assert_eq!(value["level"], "success");
    }

    #[test]
    fn test_display_changed_carries_snapshot() {
        let event = DialerEvent::DisplayChanged(Snapshot::default());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "display_changed");
        assert_eq!(value["display"], "+1 561 609 1285");
        assert_eq!(value["call_enabled"], false);
    }
}
