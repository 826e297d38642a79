//! Wire frame formats
//!
//! Field names and casing here are the contract with the two downstream
//! consumers (browser client and telephony media gateway); do not rename.

use serde::{Deserialize, Serialize};

/// Interactive-session frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractiveFrame {
    /// One fixed-duration chunk of encoded audio
    AudioData {
        /// Base64 PCM16 little-endian
        data: String,
        frame_index: u64,
        total_frames: u64,
        sample_rate: u32,
        is_final: bool,
    },
}

/// Telephony-session frame kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TelephonyKind {
    AudioData,
    StopAudio,
}

/// Audio payload of a telephony frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelephonyAudio {
    /// Base64 PCM16 little-endian
    pub data: String,
    #[serde(rename = "sequenceId")]
    pub sequence_id: u64,
}

/// Telephony-session frame
///
/// Audio frames carry `StopAudio: null`; the stop/flush control frame
/// carries `AudioData: null` and is sent only on barge-in/interruption -
/// sending it on normal completion would flush audio belonging to a
/// still-in-flight subsequent chunk of the same response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelephonyFrame {
    pub kind: TelephonyKind,
    #[serde(rename = "AudioData")]
    pub audio_data: Option<TelephonyAudio>,
    #[serde(rename = "StopAudio")]
    pub stop_audio: Option<bool>,
}

impl TelephonyFrame {
    pub fn audio(data: String, sequence_id: u64) -> Self {
        Self {
            kind: TelephonyKind::AudioData,
            audio_data: Some(TelephonyAudio { data, sequence_id }),
            stop_audio: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            kind: TelephonyKind::StopAudio,
            audio_data: None,
            stop_audio: Some(true),
        }
    }
}
