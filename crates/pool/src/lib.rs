//! Tiered resource pooling with session affinity
//!
//! This crate provides the allocation layer for expensive synthesis and
//! recognition client handles:
//! - Three latency tiers: dedicated (per-session cache), warm (pre-filled
//!   queue), cold (fresh construction)
//! - Background warm-queue replenishment and stale-session eviction
//! - Point-in-time snapshots for the diagnostics surface
//!
//! Pools are owned by an injected [`PoolRegistry`], never by process-wide
//! statics; the connection manager constructs the registry and passes it
//! into orchestrator and server state.

pub mod metrics;
pub mod pool;
pub mod registry;

pub use metrics::{MetricsSnapshot, PoolMetrics, PoolSnapshot};
pub use pool::{AllocationTier, PoolConfig, ResourceFactory, ResourcePool};
pub use registry::{PoolDiagnostics, PoolRegistry};

use thiserror::Error;

/// Pool errors
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    /// Cold construction failed - exhaustion is the caller's problem, the
    /// caller degrades (skips the turn) rather than crashing the session
    #[error("Resource factory error: {0}")]
    Factory(String),

    #[error("Acquire timed out")]
    AcquireTimeout,

    #[error("Pool is shut down")]
    ShutDown,
}
