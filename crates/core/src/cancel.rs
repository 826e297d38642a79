//! Level-triggered cancellation signal
//!
//! The turn-taking/speech-detection layer raises this signal on barge-in;
//! the playback core only ever reads it. It stays set until the producer
//! resets it, so checking repeatedly is safe (no one-shot consumption).

use tokio::sync::watch;

/// Shared cancellation flag
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Raise the signal (producer side)
    pub fn set(&self) {
        let _ = self.tx.send(true);
    }

    /// Lower the signal (producer side, before the next turn)
    pub fn reset(&self) {
        let _ = self.tx.send(false);
    }

    /// Current level
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is raised
    ///
    /// Returns immediately if already set. If the producer side is dropped
    /// without ever raising the signal, this pends forever - cancellation
    /// simply never arrives.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // wait_for checks the current value first, so a set signal resolves
        // without waiting for an edge
        if rx.wait_for(|&v| v).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
