//! Core traits and types for voice-relay
//!
//! This crate provides foundational types used across all other crates:
//! - Audio clip types, sample rates, and PCM16 conversion
//! - Voice parameters with per-transport rate normalization
//! - The level-triggered cancellation signal consumed by playback
//! - Traits for pooled resources and the opaque synthesis engine
//! - Engine error types

pub mod audio;
pub mod cancel;
pub mod error;
pub mod traits;
pub mod voice;

pub use audio::{AudioClip, SampleRate};
pub use cancel::CancellationSignal;
pub use error::EngineError;
pub use traits::{PoolResource, SpeechResource, SynthesisEngine, WarmSignatures};
pub use voice::{SpeechRate, VoiceParams};
