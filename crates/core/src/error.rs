//! Engine error types

use thiserror::Error;

/// Errors surfaced by an opaque synthesis engine
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Engine not ready: {0}")]
    NotReady(String),

    #[error("Engine timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),
}
