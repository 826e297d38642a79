//! Transport encodings and paced frame delivery
//!
//! One playback episode streams fixed-duration audio frames over one of two
//! wire shapes:
//! - Interactive-session framing (browser microphone/speaker sessions)
//! - Telephony-session framing (phone calls), including the stop/flush
//!   control frame sent on interruption
//!
//! The adapter encodes frames, paces delivery, and exposes the liveness
//! check the playback loop consults between frames.

pub mod adapter;
pub mod framing;
pub mod wire;

pub use adapter::{ChannelSink, FrameSink, TransportAdapter, TransportConfig};
pub use framing::split_frames;
pub use wire::{InteractiveFrame, TelephonyAudio, TelephonyFrame, TelephonyKind};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire shape for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportEncoding {
    /// Browser microphone/speaker session
    Interactive,
    /// Phone call
    Telephony,
}

/// Transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection closed")]
    Disconnected,

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Send channel closed")]
    ChannelClosed,
}
