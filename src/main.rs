//! dialer-daemon: simulated phone dialer
//!
//! Runs the dialer as a long-lived process and provides:
//! - A keypad read from stdin (digits, `*`, `#` and action words)
//! - An explicit Idle/InCall state machine with a simulated connect delay
//! - Toast notifications and a key tone for user feedback
//! - IPC server for presentation clients
//!
//! No real calls or messages are ever placed.

mod config;
mod events;
mod ipc;
mod keypad;
mod lifecycle;
mod notify;
mod state;
mod tone;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::DialerEvent;
use crate::ipc::Server;
use crate::keypad::KeypadListener;
use crate::lifecycle::ShutdownSignal;
use crate::notify::Notifier;
use crate::state::{Dialer, DialerHandle};
use crate::tone::{BellSink, NullSink, ToneSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "dialer-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        connect_delay_ms = config.connect_delay.as_millis() as u64,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    // Keypad and IPC -> dialer
    let (command_tx, command_rx) = mpsc::channel(32);
    // Dialer -> renderer, tone player and subscribed clients
    let (event_tx, _event_rx) = broadcast::channel::<DialerEvent>(64);

    let notifier = Notifier::new(config.toast, event_tx.clone());
    let mut dialer = Dialer::new(
        config.connect_delay,
        command_tx.downgrade(),
        event_tx.clone(),
        notifier,
    );
    let handle = DialerHandle::new(command_tx.clone(), dialer.snapshots(), event_tx.clone());

    let keypad = KeypadListener::new(command_tx);
    if config.keypad_stdin {
        match keypad.start() {
            Ok(()) => info!("keypad listener started"),
            Err(e) => {
                error!(%e, "failed to start keypad listener");
                warn!("continuing without stdin keypad");
            }
        }
    }

    let sink: Box<dyn ToneSink> = if config.mute {
        Box::new(NullSink)
    } else {
        Box::new(BellSink::stderr())
    };

    let server = Server::new(&config.socket_path, handle)?;
    let render_rx = event_tx.subscribe();
    let tone_rx = event_tx.subscribe();

    info!("dialer initialized, entering main loop");

    tokio::select! {
        _ = dialer.run(command_rx) => {
            info!("dialer exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = render(render_rx) => {
            info!("renderer exited");
        }

        _ = tone::run_tone_player(sink, tone_rx) => {
            info!("tone player exited");
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(%e, "failed to install signal handlers"),
            }
        }
    }

    info!("shutting down...");

    keypad.stop();
    server.shutdown().await;

    info!("dialer-daemon stopped");

    Ok(())
}

/// Log what a screen would show for each dialer event
async fn render(mut events: broadcast::Receiver<DialerEvent>) {
    loop {
        match events.recv().await {
            Ok(DialerEvent::DisplayChanged(snapshot)) => {
                info!(
                    display = %snapshot.display,
                    call_enabled = snapshot.call_enabled,
                    status = snapshot.call_status.as_deref().unwrap_or(""),
                    "display"
                );
            }
            Ok(DialerEvent::Toast(toast)) => {
                info!(level = %toast.level, "{}", toast.message);
            }
            Ok(event @ (DialerEvent::KeyTone { .. } | DialerEvent::ToastLifecycle { .. })) => {
                debug!(%event, "dialer event");
            }
            Ok(event) => {
                info!(%event, "dialer event");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "renderer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
