//! Injected pool registry
//!
//! Owns the named pools of one process. Constructed by the connection
//! manager and passed by reference into orchestrator construction and the
//! diagnostics surface - resource caches are never process-wide statics.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use voice_relay_core::PoolResource;

use crate::metrics::PoolSnapshot;
use crate::pool::ResourcePool;

/// Object-safe diagnostic view over a typed pool
#[async_trait]
pub trait PoolDiagnostics: Send + Sync {
    fn name(&self) -> &str;

    async fn snapshot(&self) -> PoolSnapshot;

    async fn shutdown(&self);
}

#[async_trait]
impl<T: PoolResource> PoolDiagnostics for ResourcePool<T> {
    fn name(&self) -> &str {
        ResourcePool::name(self)
    }

    async fn snapshot(&self) -> PoolSnapshot {
        ResourcePool::snapshot(self).await
    }

    async fn shutdown(&self) {
        ResourcePool::shutdown(self).await
    }
}

/// Named pools owned by this process
#[derive(Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, Arc<dyn PoolDiagnostics>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool under its configured name
    pub fn register(&self, pool: Arc<dyn PoolDiagnostics>) {
        let name = pool.name().to_string();
        tracing::info!(pool = %name, "Registered resource pool");
        self.pools.write().insert(name, pool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PoolDiagnostics>> {
        self.pools.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.pools.read().keys().cloned().collect()
    }

    /// Snapshots of every registered pool
    pub async fn snapshots(&self) -> Vec<PoolSnapshot> {
        let pools: Vec<Arc<dyn PoolDiagnostics>> =
            self.pools.read().values().cloned().collect();

        let mut snapshots = Vec::with_capacity(pools.len());
        for pool in pools {
            snapshots.push(pool.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Shut down every registered pool
    pub async fn shutdown_all(&self) {
        let pools: Vec<Arc<dyn PoolDiagnostics>> =
            self.pools.read().values().cloned().collect();

        for pool in pools {
            pool.shutdown().await;
        }
    }
}
