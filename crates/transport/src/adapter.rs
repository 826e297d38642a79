//! Transport adapter: encode, pace, deliver
//!
//! The adapter owns one connection's outbound audio path. It encodes PCM
//! frames into the connection's wire shape and paces delivery: interactive
//! sessions are fed at the real playback rate, telephony sessions are fed
//! faster than real time because the downstream telephony buffer paces the
//! audible output - pushing ahead fills the pipe without affecting audible
//! timing or frame order.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use voice_relay_core::{AudioClip, SampleRate};

use crate::wire::{InteractiveFrame, TelephonyFrame};
use crate::{TransportEncoding, TransportError};

/// Outbound message writer for one live connection
///
/// Implemented by the connection layer over its socket writer. `send` takes
/// the serialized frame text; `is_connected` is the liveness check the
/// playback loop consults between frames.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, payload: String) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Transport configuration for one connection
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub encoding: TransportEncoding,
    /// Target sample rate frames are delivered at
    pub sample_rate: SampleRate,
    /// Frame duration in milliseconds
    pub frame_ms: u32,
    /// Telephony frames are paced at `frame_ms / divisor`
    pub telephony_pace_divisor: u32,
}

impl TransportConfig {
    pub fn interactive(sample_rate: SampleRate) -> Self {
        Self {
            encoding: TransportEncoding::Interactive,
            sample_rate,
            frame_ms: 20,
            telephony_pace_divisor: 4,
        }
    }

    pub fn telephony(sample_rate: SampleRate) -> Self {
        Self {
            encoding: TransportEncoding::Telephony,
            sample_rate,
            frame_ms: 20,
            telephony_pace_divisor: 4,
        }
    }
}

/// Encodes and delivers one connection's audio frames
pub struct TransportAdapter {
    config: TransportConfig,
    sink: Arc<dyn FrameSink>,
    frames_sent: AtomicU64,
}

impl TransportAdapter {
    pub fn new(config: TransportConfig, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            config,
            sink,
            frames_sent: AtomicU64::new(0),
        }
    }

    pub fn encoding(&self) -> TransportEncoding {
        self.config.encoding
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.config.sample_rate
    }

    pub fn frame_ms(&self) -> u32 {
        self.config.frame_ms
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_connected()
    }

    /// Inter-frame delay for this wire shape
    ///
    /// Interactive sessions play as frames arrive, so delivery matches the
    /// real playback rate. Telephony delivery runs ahead of real time; the
    /// media gateway buffer is what the listener actually hears.
    pub fn pace_delay(&self) -> Duration {
        let ms = match self.config.encoding {
            TransportEncoding::Interactive => self.config.frame_ms,
            TransportEncoding::Telephony => {
                self.config.frame_ms / self.config.telephony_pace_divisor.max(1)
            },
        };
        Duration::from_millis(ms as u64)
    }

    /// Encode and send one frame, then sleep the pacing delay
    pub async fn send_frame(
        &self,
        samples: &[f32],
        sequence_id: u64,
        total_frames: u64,
        is_final: bool,
    ) -> Result<(), TransportError> {
        if !self.sink.is_connected() {
            return Err(TransportError::Disconnected);
        }

        let data = BASE64.encode(
            AudioClip::new(samples.to_vec(), self.config.sample_rate).to_pcm16(),
        );

        let payload = match self.config.encoding {
            TransportEncoding::Interactive => {
                let frame = InteractiveFrame::AudioData {
                    data,
                    frame_index: sequence_id,
                    total_frames,
                    sample_rate: self.config.sample_rate.as_u32(),
                    is_final,
                };
                serde_json::to_string(&frame)
                    .map_err(|e| TransportError::Encode(e.to_string()))?
            },
            TransportEncoding::Telephony => {
                let frame = TelephonyFrame::audio(data, sequence_id);
                serde_json::to_string(&frame)
                    .map_err(|e| TransportError::Encode(e.to_string()))?
            },
        };

        self.sink.send(payload).await?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);

        tokio::time::sleep(self.pace_delay()).await;
        Ok(())
    }

    /// Send the stop/flush control frame
    ///
    /// Telephony only; the interactive client discards its queue on its own
    /// when the next response starts. Callers invoke this on barge-in or
    /// interruption, never on normal completion.
    pub async fn send_stop(&self) -> Result<(), TransportError> {
        match self.config.encoding {
            TransportEncoding::Interactive => Ok(()),
            TransportEncoding::Telephony => {
                if !self.sink.is_connected() {
                    return Err(TransportError::Disconnected);
                }
                let payload = serde_json::to_string(&TelephonyFrame::stop())
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                self.sink.send(payload).await
            },
        }
    }
}

/// Channel-backed sink
///
/// Used as the in-process loopback for tests and local drivers; production
/// connections implement [`FrameSink`] over their socket writer.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
    connected: AtomicBool,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                connected: AtomicBool::new(true),
            }),
            rx,
        )
    }

    /// Simulate the peer going away
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.tx
            .send(payload)
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
