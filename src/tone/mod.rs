//! Keypad blip
//!
//! The tone is rendered as samples and handed to a `ToneSink`. Playback
//! is best-effort: a failing sink is logged and otherwise ignored.

use std::io::Write;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::DialerEvent;

/// Sample rate used when rendering for playback
pub const SAMPLE_RATE: u32 = 44_100;

/// A short sine blip with an exponential decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTone {
    pub frequency_hz: f32,
    pub start_gain: f32,
    pub end_gain: f32,
    pub duration: Duration,
}

impl Default for KeyTone {
    fn default() -> Self {
        Self {
            frequency_hz: 800.0,
            start_gain: 0.1,
            end_gain: 0.01,
            duration: Duration::from_millis(100),
        }
    }
}

impl KeyTone {
    /// Envelope gain `t` seconds into the tone
    pub fn gain_at(&self, t: f32) -> f32 {
        let progress = (t / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        self.start_gain * (self.end_gain / self.start_gain).powf(progress)
    }

    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let len = (self.duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let step = std::f32::consts::TAU * self.frequency_hz / sample_rate as f32;

        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (step * i as f32).sin() * self.gain_at(t)
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToneError {
    #[error("audio output unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("audio output rejected {0} samples")]
    Rejected(usize),
}

/// Playback target for rendered tones
pub trait ToneSink: Send {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), ToneError>;
}

/// Rings the terminal bell in place of real audio
pub struct BellSink<W> {
    out: W,
}

impl BellSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }
}

impl<W: Write + Send> ToneSink for BellSink<W> {
    fn play(&mut self, samples: &[f32], _sample_rate: u32) -> Result<(), ToneError> {
        if samples.is_empty() {
            return Ok(());
        }
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Discards everything (muted)
pub struct NullSink;

impl ToneSink for NullSink {
    fn play(&mut self, _samples: &[f32], _sample_rate: u32) -> Result<(), ToneError> {
        Ok(())
    }
}

/// Play `tone`, swallowing any sink failure
pub fn play_best_effort(sink: &mut dyn ToneSink, tone: &KeyTone) {
    let samples = tone.render(SAMPLE_RATE);
    if let Err(e) = sink.play(&samples, SAMPLE_RATE) {
        debug!(%e, "key tone not played");
    }
}

/// Play the key tone for every `KeyTone` event until the bus closes
pub async fn run_tone_player(mut sink: Box<dyn ToneSink>, mut events: broadcast::Receiver<DialerEvent>) {
    let tone = KeyTone::default();
    info!("tone player started");

    loop {
        match events.recv().await {
            Ok(DialerEvent::KeyTone { key }) => {
                debug!(%key, "key tone");
                play_best_effort(sink.as_mut(), &tone);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "tone player lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    info!("tone player stopped");
}
