//! Playback orchestration
//!
//! One playback episode per agent response: acquire a synthesis resource,
//! warm the voice once per signature, synthesize (raced against the shared
//! barge-in signal), slice into fixed-duration frames, and stream them
//! under the connection's playback lock - releasing every resource on every
//! exit path.

pub mod connection;
pub mod episode;
pub mod orchestrator;

pub use connection::{ConnectionRegistry, ConnectionState};
pub use episode::{PlaybackEpisode, PlaybackStatus};
pub use orchestrator::{PlaybackConfig, PlaybackOrchestrator, PlaybackRequest};
