//! Playback episode state machine

use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Episode status
///
/// `Pending -> Queued -> Started -> <terminal>`; every terminal state ends
/// the episode, a new `play()` call always starts a fresh episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Created, resource not yet resolved
    Pending,
    /// Resource resolved, synthesis not yet complete
    Queued,
    /// Streaming frames
    Started,
    /// All frames delivered
    Completed,
    /// Shared cancellation signal observed (listener spoke)
    BargeIn,
    /// Per-connection stop request or transport loss mid-stream
    Interrupted,
    /// Synthesis or transport failure
    Failed,
    /// Cancellation was already requested when playback was entered
    Cancelled,
    /// Synthesis produced no frameable audio
    NoAudio,
    /// No resource could be allocated
    AcquireFailed,
}

impl PlaybackStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Queued | Self::Started)
    }
}

/// One synthesis-to-completion run
///
/// Created at the start of a playback request and finished - flags cleared,
/// resource released, end timestamp recorded - on every exit path.
#[derive(Debug, Clone)]
pub struct PlaybackEpisode {
    pub connection_id: String,
    pub run_id: Uuid,
    pub status: PlaybackStatus,
    /// Frames delivered to the transport, in sequence order from 0
    pub frames_sent: u64,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
}

impl PlaybackEpisode {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            run_id: Uuid::new_v4(),
            status: PlaybackStatus::Pending,
            frames_sent: 0,
            started_at: Instant::now(),
            ended_at: None,
        }
    }

    /// Advance to a non-terminal stage
    pub fn advance(&mut self, status: PlaybackStatus) {
        debug_assert!(!status.is_terminal());
        tracing::debug!(
            run_id = %self.run_id,
            connection = %self.connection_id,
            from = ?self.status,
            to = ?status,
            "Playback stage"
        );
        self.status = status;
    }

    /// Record the terminal status and end timestamp
    pub fn finish(&mut self, status: PlaybackStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.ended_at = Some(Instant::now());
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Instant::now);
        end.duration_since(self.started_at).as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PlaybackStatus::Pending.is_terminal());
        assert!(!PlaybackStatus::Queued.is_terminal());
        assert!(!PlaybackStatus::Started.is_terminal());
        assert!(PlaybackStatus::Completed.is_terminal());
        assert!(PlaybackStatus::BargeIn.is_terminal());
        assert!(PlaybackStatus::NoAudio.is_terminal());
        assert!(PlaybackStatus::AcquireFailed.is_terminal());
    }

    #[test]
    fn test_episode_lifecycle() {
        let mut episode = PlaybackEpisode::new("conn-1");
        assert_eq!(episode.status, PlaybackStatus::Pending);
        assert!(!episode.is_finished());

        episode.advance(PlaybackStatus::Queued);
        episode.advance(PlaybackStatus::Started);
        episode.finish(PlaybackStatus::Completed);

        assert!(episode.is_finished());
        assert!(episode.ended_at.is_some());
    }

    #[test]
    fn test_fresh_episode_per_run() {
        let a = PlaybackEpisode::new("conn-1");
        let b = PlaybackEpisode::new("conn-1");
        assert_ne!(a.run_id, b.run_id);
    }
}
