//! Playback orchestrator
//!
//! Runs one playback episode per agent response and races it against the
//! shared barge-in signal. Synthesis happens outside the playback lock, so
//! a slow engine on one connection never delays frame delivery on another;
//! the lock serializes only the streaming phase. Every exit path - success,
//! synthesis failure, cancellation, transport loss - flows through the same
//! finalization step that clears the connection flags and releases the
//! resource.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use voice_relay_core::{
    AudioClip, CancellationSignal, SpeechResource, SynthesisEngine, VoiceParams,
};
use voice_relay_pool::{PoolError, ResourcePool};
use voice_relay_transport::{split_frames, TransportAdapter, TransportEncoding, TransportError};

use crate::connection::{ConnectionRegistry, ConnectionState};
use crate::episode::{PlaybackEpisode, PlaybackStatus};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Bound on the one-time voice warm-up synthesis
    pub warmup_timeout: Duration,
    /// Placeholder text synthesized to warm a voice signature
    pub warmup_text: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            warmup_timeout: Duration::from_millis(1500),
            warmup_text: "Okay.".to_string(),
        }
    }
}

/// One playback request
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub connection_id: String,
    /// Session id for dedicated resource affinity; `None` borrows from the
    /// shared tiers
    pub session_id: Option<String>,
    pub text: String,
    pub voice: VoiceParams,
}

impl PlaybackRequest {
    pub fn new(connection_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            session_id: None,
            text: text.into(),
            voice: VoiceParams::default(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_voice(mut self, voice: VoiceParams) -> Self {
        self.voice = voice;
        self
    }
}

/// How the episode's resource was borrowed, deciding its fate on cleanup
enum Borrow<R> {
    /// Retained in the session cache for the next turn
    SessionBound(Arc<R>),
    /// Returned to the pool when the episode ends
    Temporary(Arc<R>),
}

impl<R> Borrow<R> {
    fn resource(&self) -> &Arc<R> {
        match self {
            Borrow::SessionBound(r) | Borrow::Temporary(r) => r,
        }
    }
}

enum SynthAttempt {
    Audio(AudioClip),
    Cancelled,
    Error,
}

/// Per-response playback pipeline
pub struct PlaybackOrchestrator<R: SpeechResource> {
    pool: Arc<ResourcePool<R>>,
    engine: Arc<dyn SynthesisEngine<R>>,
    connections: ConnectionRegistry,
    config: PlaybackConfig,
}

impl<R: SpeechResource> PlaybackOrchestrator<R> {
    pub fn new(
        pool: Arc<ResourcePool<R>>,
        engine: Arc<dyn SynthesisEngine<R>>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            pool,
            engine,
            connections: ConnectionRegistry::new(),
            config,
        }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Ask the connection's current episode to stop streaming
    ///
    /// Returns whether the connection is known. The flag is consumed by the
    /// per-frame checks and cleared when the episode finishes.
    pub fn request_stop(&self, connection_id: &str) -> bool {
        match self.connections.get(connection_id) {
            Some(conn) => {
                conn.request_stop();
                true
            },
            None => false,
        }
    }

    /// Forget a connection after it closes
    pub fn connection_closed(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    /// Synthesize and stream one response
    ///
    /// Always returns a finished episode; failures (exhaustion, engine
    /// errors, transport loss, cancellation) are recorded as the episode's
    /// terminal status, never raised.
    pub async fn play(
        &self,
        request: PlaybackRequest,
        adapter: &TransportAdapter,
        cancel: &CancellationSignal,
    ) -> PlaybackEpisode {
        let mut episode = PlaybackEpisode::new(&request.connection_id);
        let conn = self.connections.entry(&request.connection_id);

        let borrow = match self.resolve_resource(&request).await {
            Ok(borrow) => borrow,
            Err(e) => {
                tracing::warn!(
                    run_id = %episode.run_id,
                    connection = %request.connection_id,
                    error = %e,
                    "No synthesis resource available, skipping turn"
                );
                episode.finish(PlaybackStatus::AcquireFailed);
                return episode;
            },
        };
        episode.advance(PlaybackStatus::Queued);

        let status = self
            .run_episode(&mut episode, &conn, borrow.resource().clone(), &request, adapter, cancel)
            .await;

        // Every path through run_episode lands here; cleanup cannot be skipped
        self.finish_episode(&mut episode, status, &conn, borrow).await;
        episode
    }

    /// Non-blocking [`play`](Self::play)
    pub fn play_detached(
        self: &Arc<Self>,
        request: PlaybackRequest,
        adapter: Arc<TransportAdapter>,
        cancel: CancellationSignal,
    ) -> JoinHandle<PlaybackEpisode> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.play(request, &adapter, &cancel).await })
    }

    /// Dedicated acquisition with a temporary-borrow fallback
    async fn resolve_resource(&self, request: &PlaybackRequest) -> Result<Borrow<R>, PoolError> {
        let session_id = request.session_id.as_deref();
        let session_bound =
            session_id.map(|s| !s.is_empty()).unwrap_or(false) && self.pool.session_awareness();

        match self.pool.acquire_for_session(session_id, None).await {
            Ok((resource, tier)) => {
                tracing::debug!(
                    connection = %request.connection_id,
                    tier = ?tier,
                    session_bound,
                    "Synthesis resource resolved"
                );
                if session_bound {
                    Ok(Borrow::SessionBound(resource))
                } else {
                    Ok(Borrow::Temporary(resource))
                }
            },
            Err(e) => {
                tracing::warn!(
                    connection = %request.connection_id,
                    error = %e,
                    "Dedicated allocation failed, trying a temporary borrow"
                );
                self.pool.acquire(None).await.map(Borrow::Temporary)
            },
        }
    }

    /// Synthesis and streaming; returns the terminal status, never escapes
    /// past the caller's finalization
    async fn run_episode(
        &self,
        episode: &mut PlaybackEpisode,
        conn: &ConnectionState,
        resource: Arc<R>,
        request: &PlaybackRequest,
        adapter: &TransportAdapter,
        cancel: &CancellationSignal,
    ) -> PlaybackStatus {
        // Already cancelled on entry: nothing was ever started
        if cancel.is_set() {
            return PlaybackStatus::Cancelled;
        }

        let voice = match adapter.encoding() {
            TransportEncoding::Telephony => request.voice.normalized_for_telephony(),
            TransportEncoding::Interactive => request.voice.clone(),
        };

        self.warm_voice(&resource, &voice).await;

        conn.set_synthesizing(true);
        let synth = self.synthesize_with_retry(&resource, &request.text, &voice, cancel).await;
        conn.set_synthesizing(false);

        let clip = match synth {
            SynthAttempt::Audio(clip) => clip,
            // Barge-in won the race: zero frames were sent
            SynthAttempt::Cancelled => return PlaybackStatus::BargeIn,
            SynthAttempt::Error => return PlaybackStatus::Failed,
        };

        let frames = match self.frame_clip(&clip, adapter) {
            Some(frames) => frames,
            None => return PlaybackStatus::NoAudio,
        };

        episode.advance(PlaybackStatus::Started);
        self.stream_frames(episode, conn, &frames, adapter, cancel).await
    }

    /// One-time warm-up per (voice, style, rate) signature and resource
    ///
    /// Bounded and best-effort; the signature is remembered either way so a
    /// failing warm-up cannot stall every subsequent turn.
    async fn warm_voice(&self, resource: &Arc<R>, voice: &VoiceParams) {
        let signature = voice.signature();
        if resource.is_voice_warmed(&signature) {
            return;
        }

        let result = tokio::time::timeout(
            self.config.warmup_timeout,
            self.engine
                .synthesize(resource.as_ref(), &self.config.warmup_text, voice),
        )
        .await;

        match result {
            Ok(Ok(_)) => tracing::debug!(signature = %signature, "Voice warmed"),
            Ok(Err(e)) => tracing::warn!(signature = %signature, error = %e, "Voice warm-up failed"),
            Err(_) => tracing::warn!(signature = %signature, "Voice warm-up timed out"),
        }

        resource.mark_voice_warmed(&signature);
    }

    /// Cancellable synthesis with one unstyled retry
    async fn synthesize_with_retry(
        &self,
        resource: &Arc<R>,
        text: &str,
        voice: &VoiceParams,
        cancel: &CancellationSignal,
    ) -> SynthAttempt {
        match self.synthesize_once(resource, text, voice, cancel).await {
            SynthAttempt::Error => {
                tracing::warn!("Synthesis failed, retrying without style/rate overrides");
                self.synthesize_once(resource, text, &voice.without_overrides(), cancel)
                    .await
            },
            attempt => attempt,
        }
    }

    /// Race one synthesis task against the cancellation signal
    ///
    /// First to complete wins; a cancellation win aborts the synthesis task
    /// before a single frame exists.
    async fn synthesize_once(
        &self,
        resource: &Arc<R>,
        text: &str,
        voice: &VoiceParams,
        cancel: &CancellationSignal,
    ) -> SynthAttempt {
        let engine = self.engine.clone();
        let resource = resource.clone();
        let text = text.to_string();
        let voice = voice.clone();

        let mut task = tokio::spawn(async move {
            engine.synthesize(resource.as_ref(), &text, &voice).await
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                task.abort();
                SynthAttempt::Cancelled
            }
            joined = &mut task => match joined {
                Ok(Ok(clip)) => SynthAttempt::Audio(clip),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Synthesis error");
                    SynthAttempt::Error
                },
                Err(e) => {
                    tracing::error!(error = %e, "Synthesis task died");
                    SynthAttempt::Error
                },
            }
        }
    }

    /// Split into fixed-duration frames, padding short clips once
    fn frame_clip(&self, clip: &AudioClip, adapter: &TransportAdapter) -> Option<Vec<Vec<f32>>> {
        if clip.is_empty() {
            return None;
        }

        let frames = split_frames(clip, adapter.sample_rate(), adapter.frame_ms());
        if !frames.is_empty() {
            return Some(frames);
        }

        // Non-empty audio shorter than one frame: pad with one frame of
        // silence and retry the split once
        let mut samples = clip.samples.to_vec();
        samples.extend(std::iter::repeat(0.0).take(clip.sample_rate.frame_size(adapter.frame_ms())));
        let padded = AudioClip::new(samples, clip.sample_rate);

        let frames = split_frames(&padded, adapter.sample_rate(), adapter.frame_ms());
        if frames.is_empty() {
            None
        } else {
            Some(frames)
        }
    }

    /// Deliver frames in sequence order under the connection's playback lock
    ///
    /// Every frame re-checks the stop flag, the shared cancellation signal,
    /// and transport liveness before sending.
    async fn stream_frames(
        &self,
        episode: &mut PlaybackEpisode,
        conn: &ConnectionState,
        frames: &[Vec<f32>],
        adapter: &TransportAdapter,
        cancel: &CancellationSignal,
    ) -> PlaybackStatus {
        let _guard = conn.stream_guard().await;
        conn.set_playing(true);

        let total = frames.len() as u64;
        let mut status = PlaybackStatus::Completed;

        for (index, samples) in frames.iter().enumerate() {
            if conn.stop_requested() {
                status = PlaybackStatus::Interrupted;
                break;
            }
            if cancel.is_set() {
                status = PlaybackStatus::BargeIn;
                break;
            }
            if !adapter.is_connected() {
                status = PlaybackStatus::Interrupted;
                break;
            }

            let sequence_id = index as u64;
            let is_final = sequence_id + 1 == total;
            match adapter.send_frame(samples, sequence_id, total, is_final).await {
                Ok(()) => episode.frames_sent += 1,
                Err(TransportError::Disconnected) => {
                    status = PlaybackStatus::Interrupted;
                    break;
                },
                Err(e) => {
                    tracing::warn!(
                        run_id = %episode.run_id,
                        error = %e,
                        "Frame send failed"
                    );
                    status = PlaybackStatus::Failed;
                    break;
                },
            }
        }

        // Stop/flush goes out only when playback was cut short; on normal
        // completion it would truncate a still-in-flight subsequent chunk
        if matches!(status, PlaybackStatus::BargeIn | PlaybackStatus::Interrupted) {
            if let Err(e) = adapter.send_stop().await {
                tracing::debug!(error = %e, "Stop frame not delivered");
            }
        }

        status
    }

    /// Guaranteed cleanup: flags cleared, end timestamp recorded, resource
    /// released
    async fn finish_episode(
        &self,
        episode: &mut PlaybackEpisode,
        status: PlaybackStatus,
        conn: &ConnectionState,
        borrow: Borrow<R>,
    ) {
        conn.set_playing(false);
        conn.set_synthesizing(false);
        conn.clear_stop_request();
        episode.finish(status);

        match borrow {
            // Stays in the session cache for the next turn
            Borrow::SessionBound(_) => {},
            Borrow::Temporary(resource) => self.pool.release(resource).await,
        }

        tracing::info!(
            run_id = %episode.run_id,
            connection = %episode.connection_id,
            status = ?episode.status,
            frames = episode.frames_sent,
            duration_ms = episode.duration_ms(),
            "Playback finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use voice_relay_core::{EngineError, PoolResource, SampleRate, WarmSignatures};
    use voice_relay_pool::{PoolConfig, ResourceFactory};
    use voice_relay_transport::{ChannelSink, TransportConfig};

    struct FakeClient {
        warm: WarmSignatures,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                warm: WarmSignatures::new(),
            }
        }
    }

    // Voice warm-state is engine cache, not per-session customization, so
    // the default clear_session_state is enough
    impl PoolResource for FakeClient {}

    impl SpeechResource for FakeClient {
        fn is_voice_warmed(&self, signature: &str) -> bool {
            self.warm.contains(signature)
        }

        fn mark_voice_warmed(&self, signature: &str) {
            self.warm.insert(signature);
        }
    }

    struct ClientFactory;

    #[async_trait]
    impl ResourceFactory<FakeClient> for ClientFactory {
        async fn create(&self) -> Result<FakeClient, voice_relay_pool::PoolError> {
            Ok(FakeClient::new())
        }
    }

    /// Engine producing a fixed-duration 16kHz clip; optionally failing the
    /// first N calls
    struct FakeEngine {
        clip_ms: u32,
        delay: Duration,
        failures_left: AtomicUsize,
        calls: parking_lot::Mutex<Vec<(String, VoiceParams)>>,
    }

    impl FakeEngine {
        fn new(clip_ms: u32) -> Self {
            Self {
                clip_ms,
                delay: Duration::ZERO,
                failures_left: AtomicUsize::new(0),
                calls: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn fail_next(&self, count: usize) {
            self.failures_left.store(count, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<(String, VoiceParams)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SynthesisEngine<FakeClient> for FakeEngine {
        async fn synthesize(
            &self,
            _resource: &FakeClient,
            text: &str,
            voice: &VoiceParams,
        ) -> Result<AudioClip, EngineError> {
            self.calls.lock().push((text.to_string(), voice.clone()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(EngineError::Synthesis("injected".to_string()));
            }

            let samples = vec![0.1; SampleRate::Hz16000.frame_size(self.clip_ms)];
            Ok(AudioClip::new(samples, SampleRate::Hz16000))
        }
    }

    fn test_pool() -> Arc<ResourcePool<FakeClient>> {
        Arc::new(ResourcePool::new(
            PoolConfig {
                name: "synthesis".to_string(),
                warm_pool_size: 1,
                enable_background_warmup: false,
                ..Default::default()
            },
            Arc::new(ClientFactory),
        ))
    }

    fn orchestrator(
        engine: Arc<FakeEngine>,
    ) -> (Arc<PlaybackOrchestrator<FakeClient>>, Arc<ResourcePool<FakeClient>>) {
        let pool = test_pool();
        let orchestrator = Arc::new(PlaybackOrchestrator::new(
            pool.clone(),
            engine,
            PlaybackConfig::default(),
        ));
        (orchestrator, pool)
    }

    fn telephony_adapter() -> (TransportAdapter, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (sink, rx) = ChannelSink::new();
        (
            TransportAdapter::new(TransportConfig::telephony(SampleRate::Hz8000), sink),
            rx,
        )
    }

    #[tokio::test]
    async fn test_completed_playback() {
        let engine = Arc::new(FakeEngine::new(100));
        let (orchestrator, _) = orchestrator(engine);
        let (adapter, mut rx) = telephony_adapter();
        let cancel = CancellationSignal::new();

        let episode = orchestrator
            .play(PlaybackRequest::new("conn-1", "Hello there"), &adapter, &cancel)
            .await;

        assert_eq!(episode.status, PlaybackStatus::Completed);
        assert_eq!(episode.frames_sent, 5); // 100ms at 20ms frames
        assert!(episode.ended_at.is_some());

        // No stop frame on normal completion
        let mut kinds = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            kinds.push(value["kind"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds.len(), 5);
        assert!(kinds.iter().all(|k| k == "AudioData"));
    }

    #[tokio::test]
    async fn test_empty_synthesis_is_no_audio() {
        let engine = Arc::new(FakeEngine::new(0));
        let (orchestrator, _) = orchestrator(engine);
        let (adapter, _rx) = telephony_adapter();

        let episode = orchestrator
            .play(
                PlaybackRequest::new("conn-1", "Hi"),
                &adapter,
                &CancellationSignal::new(),
            )
            .await;

        assert_eq!(episode.status, PlaybackStatus::NoAudio);
        assert_eq!(episode.frames_sent, 0);
    }

    #[tokio::test]
    async fn test_short_clip_padded_to_one_frame() {
        // 10ms of audio is below one 20ms frame; padding rescues it
        let engine = Arc::new(FakeEngine::new(10));
        let (orchestrator, _) = orchestrator(engine);
        let (adapter, _rx) = telephony_adapter();

        let episode = orchestrator
            .play(
                PlaybackRequest::new("conn-1", "Hm"),
                &adapter,
                &CancellationSignal::new(),
            )
            .await;

        assert_eq!(episode.status, PlaybackStatus::Completed);
        assert_eq!(episode.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_preset_cancel_returns_cancelled() {
        let engine = Arc::new(FakeEngine::new(100));
        let (orchestrator, _) = orchestrator(engine.clone());
        let (adapter, _rx) = telephony_adapter();

        let cancel = CancellationSignal::new();
        cancel.set();

        let episode = orchestrator
            .play(PlaybackRequest::new("conn-1", "Hello"), &adapter, &cancel)
            .await;

        assert_eq!(episode.status, PlaybackStatus::Cancelled);
        assert_eq!(episode.frames_sent, 0);
        // The engine was never invoked, not even for warm-up
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_voice_warmed_once_per_signature() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, _) = orchestrator(engine.clone());
        let (adapter, _rx) = telephony_adapter();
        let cancel = CancellationSignal::new();

        let request = PlaybackRequest::new("conn-1", "First").with_session("s1");
        orchestrator.play(request, &adapter, &cancel).await;

        let request = PlaybackRequest::new("conn-1", "Second").with_session("s1");
        orchestrator.play(request, &adapter, &cancel).await;

        let calls = engine.calls();
        // warm-up + two real utterances
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].0, "Okay.");
        assert_eq!(calls[1].0, "First");
        assert_eq!(calls[2].0, "Second");
    }

    #[tokio::test]
    async fn test_synthesis_retry_drops_overrides() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, _) = orchestrator(engine.clone());
        let (adapter, _rx) = telephony_adapter();
        let cancel = CancellationSignal::new();

        let voice = VoiceParams::new("voice-a").with_style("cheerful").with_rate("fast");

        // Warm the signature first so the failure hits the real synthesis
        let request = PlaybackRequest::new("conn-1", "Warm pass").with_voice(voice.clone());
        orchestrator.play(request, &adapter, &cancel).await;

        engine.fail_next(1);
        let request = PlaybackRequest::new("conn-1", "Retry pass").with_voice(voice);
        let episode = orchestrator.play(request, &adapter, &cancel).await;

        assert_eq!(episode.status, PlaybackStatus::Completed);

        let calls = engine.calls();
        let last_two: Vec<_> = calls.iter().rev().take(2).collect();
        // Retry (most recent) carries no style/rate; the failed attempt did
        assert!(last_two[0].1.style.is_none());
        assert!(last_two[0].1.rate.is_none());
        assert!(last_two[1].1.style.is_some());
    }

    #[tokio::test]
    async fn test_synthesis_failing_twice_is_failed() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, _) = orchestrator(engine.clone());
        let (adapter, mut rx) = telephony_adapter();
        let cancel = CancellationSignal::new();

        // Warm first, then fail both the attempt and its retry
        orchestrator
            .play(PlaybackRequest::new("conn-1", "Warm"), &adapter, &cancel)
            .await;
        while rx.try_recv().is_ok() {}

        engine.fail_next(2);
        let episode = orchestrator
            .play(PlaybackRequest::new("conn-1", "Doomed"), &adapter, &cancel)
            .await;

        assert_eq!(episode.status, PlaybackStatus::Failed);
        assert_eq!(episode.frames_sent, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_telephony_rate_normalized_for_engine() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, _) = orchestrator(engine.clone());
        let (adapter, _rx) = telephony_adapter();

        let request = PlaybackRequest::new("conn-1", "Hello")
            .with_voice(VoiceParams::new("voice-a").with_rate("medium"));
        orchestrator.play(request, &adapter, &CancellationSignal::new()).await;

        let calls = engine.calls();
        assert!(calls.iter().all(|(_, v)| v.rate.as_deref() == Some("+0%")));
    }

    #[tokio::test]
    async fn test_session_resource_retained_temporary_released() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, pool) = orchestrator(engine);
        pool.prepare().await;
        let (adapter, _rx) = telephony_adapter();
        let cancel = CancellationSignal::new();

        // Session-bound: retained in the cache after the episode
        let request = PlaybackRequest::new("conn-1", "Hello").with_session("s1");
        orchestrator.play(request, &adapter, &cancel).await;
        assert_eq!(pool.snapshot().await.active_sessions, 1);

        // Temporary borrow: back in the warm queue after the episode
        assert_eq!(pool.snapshot().await.warm_pool_size, 0);
        orchestrator
            .play(PlaybackRequest::new("conn-2", "Hello"), &adapter, &cancel)
            .await;
        assert_eq!(pool.snapshot().await.warm_pool_size, 1);
        assert_eq!(pool.snapshot().await.active_sessions, 1);
    }

    #[tokio::test]
    async fn test_stop_flag_cleared_after_episode() {
        let engine = Arc::new(FakeEngine::new(40));
        let (orchestrator, _) = orchestrator(engine);
        let (adapter, _rx) = telephony_adapter();

        let conn = orchestrator.connections().entry("conn-1");
        conn.request_stop();

        let episode = orchestrator
            .play(
                PlaybackRequest::new("conn-1", "Hello"),
                &adapter,
                &CancellationSignal::new(),
            )
            .await;

        assert_eq!(episode.status, PlaybackStatus::Interrupted);
        assert!(!conn.stop_requested());
        assert!(!conn.is_playing());
        assert!(!conn.is_synthesizing());
    }
}
