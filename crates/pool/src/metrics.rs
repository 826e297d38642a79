//! Pool counters and diagnostic snapshots

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocation and warmup counters
///
/// Mutated only by the owning pool; read-only snapshots are exposed
/// externally.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub allocations_total: AtomicU64,
    pub allocations_dedicated: AtomicU64,
    pub allocations_warm: AtomicU64,
    pub allocations_cold: AtomicU64,
    pub warmup_cycles: AtomicU64,
    pub warmup_failures: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations_total: self.allocations_total.load(Ordering::Relaxed),
            allocations_dedicated: self.allocations_dedicated.load(Ordering::Relaxed),
            allocations_warm: self.allocations_warm.load(Ordering::Relaxed),
            allocations_cold: self.allocations_cold.load(Ordering::Relaxed),
            warmup_cycles: self.warmup_cycles.load(Ordering::Relaxed),
            warmup_failures: self.warmup_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter values
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub allocations_total: u64,
    pub allocations_dedicated: u64,
    pub allocations_warm: u64,
    pub allocations_cold: u64,
    pub warmup_cycles: u64,
    pub warmup_failures: u64,
}

/// Point-in-time diagnostic view of one pool
///
/// Taking a snapshot never mutates pool state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub name: String,
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub ready: bool,
    /// Current warm queue occupancy
    pub warm_pool_size: usize,
    /// Configured warm queue capacity
    pub warm_pool_target: usize,
    pub session_awareness: bool,
    pub active_sessions: usize,
    pub background_warmup: bool,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot_reflects_counters() {
        let metrics = PoolMetrics::new();
        metrics.allocations_total.fetch_add(3, Ordering::Relaxed);
        metrics.allocations_warm.fetch_add(2, Ordering::Relaxed);
        metrics.allocations_cold.fetch_add(1, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.allocations_total, 3);
        assert_eq!(snap.allocations_warm, 2);
        assert_eq!(snap.allocations_cold, 1);
        assert_eq!(snap.allocations_dedicated, 0);
    }

    #[test]
    fn test_pool_snapshot_serializes_flat() {
        let snap = PoolSnapshot {
            name: "synthesis".to_string(),
            taken_at: chrono::Utc::now(),
            ready: true,
            warm_pool_size: 2,
            warm_pool_target: 4,
            session_awareness: true,
            active_sessions: 1,
            background_warmup: false,
            metrics: MetricsSnapshot::default(),
        };

        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["name"], "synthesis");
        assert_eq!(value["warm_pool_target"], 4);
        // Counters are flattened to the top level of the snapshot object
        assert_eq!(value["allocations_total"], 0);
    }
}
