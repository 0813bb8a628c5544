//! Line-oriented keypad reader
//!
//! Reads keypad input from stdin (or any buffered reader) on a dedicated
//! thread and forwards the resulting commands to the dialer.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::Envelope;

use super::keys::parse_line;

/// Keypad listener that feeds commands into the dialer channel
pub struct KeypadListener {
    command_tx: mpsc::Sender<Envelope>,
    running: Arc<AtomicBool>,
}

impl KeypadListener {
    pub fn new(command_tx: mpsc::Sender<Envelope>) -> Self {
        Self {
            command_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start reading keypad lines from stdin
    pub fn start(&self) -> Result<(), KeypadError> {
        self.start_with_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Start reading keypad lines from `reader`.
    ///
    /// The thread exits at end of input, when the dialer channel closes,
    /// or on the first line read after `stop()`.
    pub fn start_with_reader<R>(&self, reader: R) -> Result<(), KeypadError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(KeypadError::AlreadyRunning);
        }

        let command_tx = self.command_tx.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("keypad-listener".to_string())
            .spawn(move || {
                info!("keypad listener thread started");
                read_loop(reader, command_tx, &running);
                running.store(false, Ordering::SeqCst);
                info!("keypad listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(KeypadError::ThreadSpawn(e.to_string()));
        }

        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the keypad listener
#[derive(Debug, thiserror::Error)]
pub enum KeypadError {
    #[error("keypad listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

fn read_loop<R: BufRead>(reader: R, command_tx: mpsc::Sender<Envelope>, running: &AtomicBool) {
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "failed to read keypad input");
                break;
            }
        };

        let commands = match parse_line(&line) {
            Ok(commands) => commands,
            Err(e) => {
                warn!(%e, "ignoring keypad input");
                continue;
            }
        };

        for command in commands {
            debug!(?command, "keypad command");
            // Not in an async context, so block until the dialer has room
            if command_tx.blocking_send(command.into()).is_err() {
                warn!("failed to send keypad command - channel closed?");
                return;
            }
        }
    }
}
