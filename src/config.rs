//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::notify::ToastTimings;

/// Default delay between placing a call and it connecting
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Delay before a placed call shows as connected
    pub connect_delay: Duration,

    /// Read keypad input from stdin
    pub keypad_stdin: bool,

    /// Skip the key tone
    pub mute: bool,

    /// Toast lifecycle delays
    pub toast: ToastTimings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("dialer");

        let socket_path = lookup("DIALER_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("dialer.sock"));

        let connect_delay = match lookup("DIALER_CONNECT_DELAY_MS") {
            Some(ms) => Duration::from_millis(
                ms.trim()
                    .parse()
                    .with_context(|| format!("invalid DIALER_CONNECT_DELAY_MS: {ms:?}"))?,
            ),
            None => DEFAULT_CONNECT_DELAY,
        };

        let keypad_stdin = parse_flag(lookup("DIALER_STDIN"), "DIALER_STDIN")?.unwrap_or(true);
        let mute = parse_flag(lookup("DIALER_MUTE"), "DIALER_MUTE")?.unwrap_or(false);

        Ok(Self {
            socket_path,
            data_dir,
            connect_delay,
            keypad_stdin,
            mute,
            toast: ToastTimings::default(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_flag(value: Option<String>, name: &str) -> Result<Option<bool>> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => anyhow::bail!("invalid {name}: {other:?}"),
    }
}
