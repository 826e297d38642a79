//! Voice Relay diagnostics server
//!
//! Exposes the pool health snapshots and Prometheus metrics of one
//! voice-relay process. Call control, media signaling, and conversation
//! endpoints belong to the embedding service, not this crate.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{
    init_metrics, record_playback, record_pool_allocation, record_stream_latency,
    record_synthesis_latency,
};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::PoolNotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
