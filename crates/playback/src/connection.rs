//! Per-connection playback state
//!
//! Each live connection owns one entry: the playback lock that keeps
//! episodes from interleaving frames, the stop-request flag consumed by the
//! streaming loop, and the synthesizing/playing flags the turn-taking layer
//! reads. The lock covers only the streaming phase - a slow synthesis on
//! one connection never blocks playback on another.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// State for one connection
#[derive(Debug, Default)]
pub struct ConnectionState {
    /// Playback lock: at most one episode streams frames at a time
    lock: Mutex<()>,
    /// Explicit stop request from call control
    stop_requested: AtomicBool,
    synthesizing: AtomicBool,
    playing: AtomicBool,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock held for the streaming phase of one episode
    pub async fn stream_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn clear_stop_request(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    pub fn set_synthesizing(&self, value: bool) {
        self.synthesizing.store(value, Ordering::SeqCst);
    }

    pub fn is_synthesizing(&self) -> bool {
        self.synthesizing.load(Ordering::SeqCst)
    }

    pub fn set_playing(&self, value: bool) {
        self.playing.store(value, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

/// Connection-state registry keyed by connection id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<ConnectionState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the state entry for a connection
    pub fn entry(&self, connection_id: &str) -> Arc<ConnectionState> {
        self.connections
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(ConnectionState::new()))
            .clone()
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<ConnectionState>> {
        self.connections.get(connection_id).map(|e| e.value().clone())
    }

    /// Drop a connection's entry after disconnect
    pub fn remove(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
