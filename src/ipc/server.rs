//! Unix domain socket server for IPC
//!
//! Forwards presentation requests to the dialer, answers with snapshots,
//! and pushes dialer events to subscribed clients.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::DialerEvent;
use crate::keypad::Digit;
use crate::state::{Command, DialerHandle};

use super::codec::{read_frame, write_frame, FrameError};
use super::protocol::{DialerStatus, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    dialer: DialerHandle,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

/// What woke a client connection
enum Incoming {
    Frame(Option<Result<Option<Request>, FrameError>>),
    Event(Result<DialerEvent, broadcast::error::RecvError>),
}

impl Server {
    /// Bind the socket and create the server
    pub fn new(socket_path: &Path, dialer: DialerHandle) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            dialer,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let dialer = self.dialer.clone();
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, dialer, start_time) => {
                                if let Err(e) = result {
                                    warn!(%e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        dialer: DialerHandle,
        start_time: Instant,
    ) -> Result<(), FrameError> {
        let (mut reader, mut writer) = stream.into_split();

        // Frame reads are not cancel-safe, so they get their own task
        // and the loop below selects over complete requests.
        let (request_tx, mut request_rx) = mpsc::channel(8);
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = read_frame::<_, Request>(&mut reader).await;
                let done = !matches!(frame, Ok(Some(_)));
                if request_tx.send(frame).await.is_err() || done {
                    break;
                }
            }
        });

        let mut events: Option<broadcast::Receiver<DialerEvent>> = None;

        let result = loop {
            let incoming = tokio::select! {
                frame = request_rx.recv() => Incoming::Frame(frame),
                event = next_event(&mut events) => Incoming::Event(event),
            };

            match incoming {
                Incoming::Frame(Some(Ok(Some(request)))) => {
                    debug!(?request, "received request");
                    let (response, subscribe) =
                        Self::process_request(request, &dialer, start_time).await;
                    if subscribe && events.is_none() {
                        events = Some(dialer.subscribe());
                        debug!("client subscribed to notifications");
                    }
                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                Incoming::Frame(Some(Ok(None)) | None) => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Incoming::Frame(Some(Err(e))) => break Err(e),
                Incoming::Event(Ok(event)) => {
                    if let Err(e) = write_frame(&mut writer, &Response::Event { event }).await {
                        break Err(e);
                    }
                }
                Incoming::Event(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Incoming::Event(Err(broadcast::error::RecvError::Closed)) => {
                    events = None;
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        dialer: &DialerHandle,
        start_time: Instant,
    ) -> (Response, bool) {
        let command = match &request {
            Request::Ping => return (Response::Pong, false),
            Request::Subscribe => return (Response::Subscribed, true),
            Request::GetStatus => {
                let status = DialerStatus {
                    dialer: dialer.snapshot(),
                    uptime_secs: start_time.elapsed().as_secs(),
                    ..DialerStatus::default()
                };
                return (Response::Status(status), false);
            }
            Request::Press { key } => match Digit::new(*key) {
                Some(digit) => Command::Press(digit),
                None => {
                    let message = format!("'{key}' is not a keypad key");
                    return (Response::error("invalid_key", message), false);
                }
            },
            other => match other.command() {
                Some(command) => command,
                None => return (Response::error("unsupported", "request has no action"), false),
            },
        };

        match dialer.apply(command).await {
            Ok(snapshot) => (Response::Ack(snapshot), false),
            Err(e) => (Response::error("dialer_unavailable", e.to_string()), false),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<DialerEvent>>,
) -> Result<DialerEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
