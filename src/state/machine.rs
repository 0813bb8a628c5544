//! Dialer task
//!
//! Owns the `DialState` and applies commands one at a time. Output goes
//! out as a `Snapshot` on a watch channel (latest value) and as
//! `DialerEvent`s on the broadcast bus.
//!
//! Placing a call arms a one-shot connect timer. Ending the call aborts
//! it, and every wake is also checked against the call generation so a
//! timer that fires after hang-up (or for an earlier call) never marks
//! the current call connected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::events::DialerEvent;
use crate::keypad::Digit;
use crate::notify::{Notifier, ToastLevel};

use super::dial::{DialState, State};
use super::format::format_number;

/// Inputs the dialer accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keypad character; plays the key tone, then appends if idle
    Press(Digit),
    Delete,
    Clear,
    /// Replace the whole buffer
    SetNumber(String),
    StartCall,
    EndCall,
    SendSms,
    SendMms,
    /// Connect timer for call `generation` fired
    ConnectElapsed { generation: u64 },
}

/// A command plus an optional reply slot for the resulting snapshot
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Snapshot>>,
}

impl From<Command> for Envelope {
    fn from(command: Command) -> Self {
        Self {
            command,
            reply: None,
        }
    }
}

/// Progress of the active call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    Calling { destination: String },
    Connected,
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Calling { destination } => {
                write!(f, "Calling {}...", format_number(destination))
            }
            CallStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// Everything a renderer needs to draw the dialer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub display: String,
    pub digits: String,
    pub call_active: bool,
    pub call_enabled: bool,
    pub call_status: Option<String>,
}

impl Snapshot {
    pub fn capture(dial: &DialState, status: Option<&CallStatus>) -> Self {
        Self {
            display: dial.format(),
            digits: dial.digits().to_string(),
            call_active: dial.is_call_active(),
            call_enabled: dial.call_enabled(),
            call_status: status.map(ToString::to_string),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::capture(&DialState::default(), None)
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageKind {
    Sms,
    Mms,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Sms => write!(f, "SMS"),
            MessageKind::Mms => write!(f, "MMS"),
        }
    }
}

pub struct Dialer {
    dial: DialState,
    status: Option<CallStatus>,
    /// Bumped on every placed call
    generation: u64,
    call_started_at: Option<Instant>,
    connect_delay: Duration,
    connect_timer: Option<JoinHandle<()>>,
    /// Weak so the run loop still ends once every handle is dropped
    command_tx: mpsc::WeakSender<Envelope>,
    event_tx: broadcast::Sender<DialerEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
    notifier: Notifier,
}

impl Dialer {
    pub fn new(
        connect_delay: Duration,
        command_tx: mpsc::WeakSender<Envelope>,
        event_tx: broadcast::Sender<DialerEvent>,
        notifier: Notifier,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        Self {
            dial: DialState::new(),
            status: None,
            generation: 0,
            call_started_at: None,
            connect_delay,
            connect_timer: None,
            command_tx,
            event_tx,
            snapshot_tx,
            notifier,
        }
    }

    pub fn state(&self) -> State {
        self.dial.state()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.dial, self.status.as_ref())
    }

    /// Subscribe to the latest published snapshot
    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Process commands until every sender is dropped
    pub async fn run(&mut self, mut command_rx: mpsc::Receiver<Envelope>) {
        info!("dialer started in Idle state");

        while let Some(Envelope { command, reply }) = command_rx.recv().await {
            self.apply(command);
            if let Some(reply) = reply {
                let _ = reply.send(self.snapshot());
            }
        }

        self.cancel_connect_timer();
        info!("dialer stopped");
    }

    /// Apply a single command and publish the result
    pub fn apply(&mut self, command: Command) {
        debug!(?command, "applying command");

        match command {
            Command::Press(digit) => {
                self.emit(DialerEvent::KeyTone { key: digit.as_char() });
                if !self.dial.append_digit(digit) {
                    debug!(%digit, "digit ignored during call");
                }
            }
            Command::Delete => {
                self.dial.delete_last();
            }
            Command::Clear => {
                self.dial.clear();
            }
            Command::SetNumber(number) => {
                self.dial.set_number(&number);
            }
            Command::StartCall => self.start_call(),
            Command::EndCall => self.end_call(),
            Command::SendSms => self.send_message(MessageKind::Sms),
            Command::SendMms => self.send_message(MessageKind::Mms),
            Command::ConnectElapsed { generation } => self.connect_elapsed(generation),
        }

        self.publish();
    }

    fn start_call(&mut self) {
        if !self.dial.start_call() {
            debug!("call already active");
            return;
        }

        let destination = self.dial.destination().to_string();
        self.generation += 1;
        self.call_started_at = Some(Instant::now());
        self.status = Some(CallStatus::Calling {
            destination: destination.clone(),
        });

        info!(
            from = %State::Idle,
            to = %State::InCall,
            %destination,
            generation = self.generation,
            "state transition"
        );

        self.emit(DialerEvent::CallStarted { destination });
        self.arm_connect_timer();
        self.notifier.post("Call initiated", ToastLevel::Success);
    }

    fn end_call(&mut self) {
        self.cancel_connect_timer();

        let was_active = self.dial.end_call();
        let duration_ms = self
            .call_started_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.status = None;

        if was_active {
            info!(
                from = %State::InCall,
                to = %State::Idle,
                duration_ms = duration_ms,
                "state transition"
            );
        } else {
            debug!("hang up with no active call");
        }

        self.emit(DialerEvent::CallEnded { duration_ms });
        self.notifier.post("Call ended", ToastLevel::Info);
    }

    fn connect_elapsed(&mut self, generation: u64) {
        if !self.dial.is_call_active() || generation != self.generation {
            debug!(generation, current = self.generation, "stale connect timer ignored");
            return;
        }

        self.connect_timer = None;
        self.status = Some(CallStatus::Connected);
        info!(generation, "call connected");
        self.emit(DialerEvent::CallConnected);
    }

    fn send_message(&mut self, kind: MessageKind) {
        let to = format_number(self.dial.destination());
        info!(%kind, %to, "message sent");
        self.notifier
            .post(format!("{kind} sent to {to}"), ToastLevel::Success);
    }

    fn arm_connect_timer(&mut self) {
        self.cancel_connect_timer();

        let generation = self.generation;
        let delay = self.connect_delay;
        let command_tx = self.command_tx.clone();

        self.connect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = command_tx.upgrade() {
                let _ = tx.send(Command::ConnectElapsed { generation }.into()).await;
            }
        }));
    }

    fn cancel_connect_timer(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.abort();
            debug!(generation = self.generation, "connect timer cancelled");
        }
    }

    /// Push the current snapshot if it differs from the last one published
    fn publish(&mut self) {
        let snapshot = self.snapshot();
        if *self.snapshot_tx.borrow() == snapshot {
            return;
        }

        debug!(display = %snapshot.display, call_enabled = snapshot.call_enabled, "display updated");
        self.snapshot_tx.send_replace(snapshot.clone());
        self.emit(DialerEvent::DisplayChanged(snapshot));
    }

    fn emit(&self, event: DialerEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

/// Error returned when the dialer task has stopped
#[derive(Debug, thiserror::Error)]
#[error("dialer is not running")]
pub struct DialerClosed;

/// Cloneable access to a running dialer
#[derive(Clone)]
pub struct DialerHandle {
    command_tx: mpsc::Sender<Envelope>,
    snapshot_rx: watch::Receiver<Snapshot>,
    event_tx: broadcast::Sender<DialerEvent>,
}

impl DialerHandle {
    pub fn new(
        command_tx: mpsc::Sender<Envelope>,
        snapshot_rx: watch::Receiver<Snapshot>,
        event_tx: broadcast::Sender<DialerEvent>,
    ) -> Self {
        Self {
            command_tx,
            snapshot_rx,
            event_tx,
        }
    }

    /// Send a command and wait for the snapshot it produced
    pub async fn apply(&self, command: Command) -> Result<Snapshot, DialerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Envelope {
                command,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DialerClosed)?;
        reply_rx.await.map_err(|_| DialerClosed)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialerEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastTimings;
    use crate::state::format::DEFAULT_DISPLAY;

    const CONNECT_DELAY: Duration = Duration::from_secs(2);

    fn spawn_dialer() -> (DialerHandle, broadcast::Receiver<DialerEvent>) {
        let (event_tx, event_rx) = broadcast::channel(256);
        let (command_tx, command_rx) = mpsc::channel(32);
        let notifier = Notifier::new(ToastTimings::default(), event_tx.clone());
        let mut dialer = Dialer::new(CONNECT_DELAY, command_tx.downgrade(), event_tx.clone(), notifier);
        let handle = DialerHandle::new(command_tx, dialer.snapshots(), event_tx);

        tokio::spawn(async move { dialer.run(command_rx).await });
        (handle, event_rx)
    }

    fn press(c: char) -> Command {
        Command::Press(Digit::new(c).unwrap())
    }

    async fn dial(handle: &DialerHandle, keys: &str) -> Snapshot {
        let mut snapshot = handle.snapshot();
        for c in keys.chars() {
            snapshot = handle.apply(press(c)).await.unwrap();
        }
        snapshot
    }

    fn drain(rx: &mut broadcast::Receiver<DialerEvent>) -> Vec<DialerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn toasts(events: &[DialerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                DialerEvent::Toast(toast) => Some(toast.message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let (handle, _) = spawn_dialer();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.display, DEFAULT_DISPLAY);
        assert!(!snapshot.call_active);
        assert!(!snapshot.call_enabled);
        assert_eq!(snapshot.call_status, None);
    }

    #[tokio::test]
    async fn test_dialing_updates_display() {
        let (handle, mut events) = spawn_dialer();

        let snapshot = dial(&handle, "15616091285").await;
        assert_eq!(snapshot.digits, "15616091285");
        assert_eq!(snapshot.display, "+1 561 609 1285");
        assert!(snapshot.call_enabled);
        assert_eq!(handle.snapshot(), snapshot);

        let events = drain(&mut events);
        let tones = events
            .iter()
            .filter(|e| matches!(e, DialerEvent::KeyTone { .. }))
            .count();
        assert_eq!(tones, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_during_call_plays_tone_only() {
        let (handle, mut events) = spawn_dialer();
        dial(&handle, "12").await;
        handle.apply(Command::StartCall).await.unwrap();
        drain(&mut events);

        let snapshot = handle.apply(press('3')).await.unwrap();
        assert_eq!(snapshot.digits, "12");

        let events = drain(&mut events);
        assert_eq!(events, vec![DialerEvent::KeyTone { key: '3' }]);

        let snapshot = handle.apply(Command::Clear).await.unwrap();
        assert_eq!(snapshot.digits, "12");
        let snapshot = handle.apply(Command::Delete).await.unwrap();
        assert_eq!(snapshot.digits, "12");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_connects_after_delay() {
        let (handle, mut events) = spawn_dialer();
        dial(&handle, "123").await;

        let snapshot = handle.apply(Command::StartCall).await.unwrap();
        assert!(snapshot.call_active);
        assert_eq!(snapshot.call_status.as_deref(), Some("Calling +123..."));

        tokio::time::sleep(CONNECT_DELAY + Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().call_status.as_deref(), Some("Connected"));

        let events = drain(&mut events);
        assert!(events.contains(&DialerEvent::CallStarted {
            destination: "123".to_string()
        }));
        assert!(events.contains(&DialerEvent::CallConnected));
        assert_eq!(toasts(&events), vec!["Call initiated"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_ended_before_delay_never_connects() {
        let (handle, mut events) = spawn_dialer();

        handle.apply(Command::StartCall).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = handle.apply(Command::EndCall).await.unwrap();
        assert!(!snapshot.call_active);
        assert_eq!(snapshot.call_status, None);

        tokio::time::sleep(CONNECT_DELAY * 2).await;
        assert_eq!(handle.snapshot().call_status, None);

        let events = drain(&mut events);
        assert!(!events.contains(&DialerEvent::CallConnected));
        assert!(events.contains(&DialerEvent::CallEnded { duration_ms: 500 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redial_ignores_previous_timer() {
        let (handle, mut events) = spawn_dialer();

        handle.apply(Command::StartCall).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.apply(Command::EndCall).await.unwrap();
        handle.apply(Command::StartCall).await.unwrap();
        drain(&mut events);

        // First call's deadline passes; the second call is still connecting
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(
            handle.snapshot().call_status.as_deref(),
            Some("Calling +1 561 609 1285...")
        );

        // A stale wake for the first call is ignored outright
        handle
            .apply(Command::ConnectElapsed { generation: 1 })
            .await
            .unwrap();
        assert_ne!(handle.snapshot().call_status.as_deref(), Some("Connected"));

        tokio::time::sleep(Duration::from_millis(1010)).await;
        assert_eq!(handle.snapshot().call_status.as_deref(), Some("Connected"));
        let connected = drain(&mut events)
            .into_iter()
            .filter(|e| *e == DialerEvent::CallConnected)
            .count();
        assert_eq!(connected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_call_twice_is_noop() {
        let (handle, mut events) = spawn_dialer();
        let first = handle.apply(Command::StartCall).await.unwrap();
        drain(&mut events);

        let second = handle.apply(Command::StartCall).await.unwrap();
        assert_eq!(first, second);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_end_call_while_idle_still_notifies() {
        let (handle, mut events) = spawn_dialer();
        dial(&handle, "42").await;
        drain(&mut events);

        let snapshot = handle.apply(Command::EndCall).await.unwrap();
        assert_eq!(snapshot.digits, "42");
        assert!(!snapshot.call_active);

        let events = drain(&mut events);
        assert!(events.contains(&DialerEvent::CallEnded { duration_ms: 0 }));
        assert_eq!(toasts(&events), vec!["Call ended"]);
    }

    #[tokio::test]
    async fn test_end_call_keeps_digits() {
        let (handle, _) = spawn_dialer();
        dial(&handle, "15616091285").await;

        assert!(handle.apply(Command::StartCall).await.unwrap().call_active);
        let snapshot = handle.apply(Command::EndCall).await.unwrap();
        assert!(!snapshot.call_active);
        assert_eq!(snapshot.digits, "15616091285");
        assert_eq!(snapshot.display, "+1 561 609 1285");
    }

    #[tokio::test]
    async fn test_messages_use_default_destination() {
        let (handle, mut events) = spawn_dialer();

        handle.apply(Command::SendSms).await.unwrap();
        handle.apply(Command::SendMms).await.unwrap();

        assert_eq!(
            toasts(&drain(&mut events)),
            vec![
                "SMS sent to +1 561 609 1285",
                "MMS sent to +1 561 609 1285"
            ]
        );
    }

    #[tokio::test]
    async fn test_messages_use_dialed_number() {
        let (handle, mut events) = spawn_dialer();
        dial(&handle, "123").await;
        drain(&mut events);

        let before = handle.snapshot();
        let after = handle.apply(Command::SendSms).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(toasts(&drain(&mut events)), vec!["SMS sent to +123"]);
    }

    #[tokio::test]
    async fn test_set_number() {
        let (handle, _) = spawn_dialer();
        let snapshot = handle
            .apply(Command::SetNumber("1 561 609 1285".to_string()))
            .await
            .unwrap();
        assert_eq!(snapshot.display, "+1 561 609 1285");
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let (event_tx, _) = broadcast::channel(16);
        let (command_tx, command_rx) = mpsc::channel(4);
        let notifier = Notifier::new(ToastTimings::default(), event_tx.clone());
        let dialer = Dialer::new(CONNECT_DELAY, command_tx.downgrade(), event_tx.clone(), notifier);
        let handle = DialerHandle::new(command_tx, dialer.snapshots(), event_tx);

        drop(command_rx);
        assert!(handle.apply(Command::Clear).await.is_err());
        assert_eq!(dialer.state(), State::Idle);
    }
}
