//! Traits for pooled resources and the synthesis engine
//!
//! The synthesis/recognition engine is an external system; this crate only
//! defines the seams the pool and playback layers program against.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::audio::AudioClip;
use crate::error::EngineError;
use crate::voice::VoiceParams;

/// A poolable resource handle
///
/// Both capabilities are optional: a type that does not override the
/// defaults is treated as always ready, with nothing to wipe between
/// sessions.
pub trait PoolResource: Send + Sync + 'static {
    /// Validity check performed on session-cache hits
    fn is_ready(&self) -> bool {
        true
    }

    /// Wipe per-session customization before reuse or discard
    fn clear_session_state(&self) {}
}

/// A pooled resource that remembers which voice signatures it has already
/// synthesized with
///
/// The orchestrator warms a (voice, style, rate) signature once per
/// resource so the first real utterance does not stall.
pub trait SpeechResource: PoolResource {
    fn is_voice_warmed(&self, _signature: &str) -> bool {
        false
    }

    fn mark_voice_warmed(&self, _signature: &str) {}
}

/// Warm-signature memory for resource types to embed
///
/// Cleared together with the rest of the per-session state.
#[derive(Debug, Default)]
pub struct WarmSignatures {
    seen: Mutex<HashSet<String>>,
}

impl WarmSignatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.seen.lock().contains(signature)
    }

    pub fn insert(&self, signature: &str) {
        self.seen.lock().insert(signature.to_string());
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

/// Text-to-audio synthesis engine
///
/// Opaque external system; may fail or be slow. CPU-bound implementations
/// are expected to offload to a blocking pool internally so frame delivery
/// for other connections is never starved.
#[async_trait]
pub trait SynthesisEngine<R: PoolResource>: Send + Sync + 'static {
    /// Synthesize text into raw audio using the given resource handle
    async fn synthesize(
        &self,
        resource: &R,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<AudioClip, EngineError>;
}
