//! Toast notifications
//!
//! Each posted toast gets a detached lifecycle task that walks it through
//! shown, dismissing and removed. Lifecycles never touch dialer state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::DialerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

impl std::fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToastLevel::Success => write!(f, "success"),
            ToastLevel::Info => write!(f, "info"),
            ToastLevel::Error => write!(f, "error"),
        }
    }
}

/// A transient notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub level: ToastLevel,
}

/// Stages a toast goes through after it is posted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastPhase {
    /// Slid into view
    Shown,
    /// Started sliding out
    Dismissing,
    /// Gone
    Removed,
}

/// Delays driving a toast's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTimings {
    /// Post to shown
    pub enter: Duration,
    /// Post to dismissing
    pub dismiss_after: Duration,
    /// Dismissing to removed
    pub exit: Duration,
}

impl Default for ToastTimings {
    fn default() -> Self {
        Self {
            enter: Duration::from_millis(100),
            dismiss_after: Duration::from_millis(3000),
            exit: Duration::from_millis(300),
        }
    }
}

/// Posts toasts onto the event bus
pub struct Notifier {
    next_id: u64,
    timings: ToastTimings,
    event_tx: broadcast::Sender<DialerEvent>,
}

impl Notifier {
    pub fn new(timings: ToastTimings, event_tx: broadcast::Sender<DialerEvent>) -> Self {
        Self {
            next_id: 1,
            timings,
            event_tx,
        }
    }

    /// Emit a toast and start its lifecycle. Must be called within a Tokio runtime.
    pub fn post(&mut self, message: impl Into<String>, level: ToastLevel) -> Toast {
        let toast = Toast {
            id: self.next_id,
            message: message.into(),
            level,
        };
        self.next_id += 1;

        info!(id = toast.id, %level, message = %toast.message, "toast posted");
        let _ = self.event_tx.send(DialerEvent::Toast(toast.clone()));

        tokio::spawn(run_lifecycle(toast.id, self.timings, self.event_tx.clone()));

        toast
    }
}

async fn run_lifecycle(id: u64, timings: ToastTimings, event_tx: broadcast::Sender<DialerEvent>) {
    let emit = |phase: ToastPhase| {
        debug!(id, ?phase, "toast phase");
        let _ = event_tx.send(DialerEvent::ToastLifecycle { id, phase });
    };

    tokio::time::sleep(timings.enter).await;
    emit(ToastPhase::Shown);

    tokio::time::sleep(timings.dismiss_after.saturating_sub(timings.enter)).await;
    emit(ToastPhase::Dismissing);

    tokio::time::sleep(timings.exit).await;
    emit(ToastPhase::Removed);
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_order_and_timing() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut notifier = Notifier::new(ToastTimings::default(), tx);
        let start = Instant::now();

        let toast = notifier.post("Call ended", ToastLevel::Info);
        assert_eq!(toast.id, 1);

        match rx.recv().await.unwrap() {
            DialerEvent::Toast(posted) => assert_eq!(posted, toast),
            other => panic!("unexpected event {other:?}"),
        }

        let mut phases = Vec::new();
        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                DialerEvent::ToastLifecycle { id, phase } => {
                    assert_eq!(id, 1);
                    phases.push((phase, start.elapsed().as_millis()));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert_eq!(
            phases,
            vec![
                (ToastPhase::Shown, 100),
                (ToastPhase::Dismissing, 3000),
                (ToastPhase::Removed, 3300),
            ]
        );
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let (tx, _rx) = broadcast::channel(16);
        let mut notifier = Notifier::new(ToastTimings::default(), tx);
        let first = notifier.post("SMS sent to +123", ToastLevel::Success);
        let second = notifier.post("MMS sent to +123", ToastLevel::Success);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_level_serialization() {
        let json = serde_json::to_string(&ToastLevel::Success).unwrap();
        assert_eq!(json, r#""success""#);
        let level: ToastLevel = serde_json::from_str(r#""error""#).unwrap();
        assert_eq!(level, ToastLevel::Error);
    }
}
