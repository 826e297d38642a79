//! Tiered resource pool
//!
//! Hands out opaque resource handles at three latency tiers: a per-session
//! cache (~0 ms), a pre-warmed queue (<50 ms), and on-demand construction
//! (~200 ms). Session-bound handles may carry per-session customization, so
//! they are discarded on release rather than returned to the warm queue.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use voice_relay_core::PoolResource;

use crate::metrics::{PoolMetrics, PoolSnapshot};
use crate::PoolError;

/// Latency class of a returned resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationTier {
    /// Returned from the per-session cache
    Dedicated,
    /// Popped from the pre-filled queue
    Warm,
    /// Freshly constructed via the factory
    Cold,
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool name for logging and snapshots
    pub name: String,
    /// Warm queue capacity (0 disables pre-warming)
    pub warm_pool_size: usize,
    /// Enable the per-session dedicated cache
    pub session_awareness: bool,
    /// Enable the periodic refill/eviction task
    pub enable_background_warmup: bool,
    /// Background task interval
    pub warmup_interval: Duration,
    /// Session cache entries untouched for longer than this are evicted
    pub session_max_age: Duration,
    /// Default bound on cold construction
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            warm_pool_size: 2,
            session_awareness: true,
            enable_background_warmup: true,
            warmup_interval: Duration::from_secs(30),
            session_max_age: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Constructs and optionally pre-warms resources
///
/// `warm` is best-effort: a `false` result or an error degrades the handle
/// to unwarmed, it never blocks allocation.
#[async_trait]
pub trait ResourceFactory<T>: Send + Sync + 'static {
    async fn create(&self) -> Result<T, PoolError>;

    async fn warm(&self, _resource: &T) -> Result<bool, PoolError> {
        Ok(true)
    }
}

struct SessionEntry<T> {
    resource: Arc<T>,
    last_used: Instant,
}

struct PoolState<T> {
    warm: VecDeque<Arc<T>>,
    sessions: HashMap<String, SessionEntry<T>>,
}

/// Tiered, session-affine resource pool
///
/// The warm queue and session cache are guarded by one async mutex. The
/// session path holds that lock across cold construction so concurrent
/// callers for the same new session id observe exactly one construction.
pub struct ResourcePool<T: PoolResource> {
    config: PoolConfig,
    factory: Arc<dyn ResourceFactory<T>>,
    state: Mutex<PoolState<T>>,
    metrics: PoolMetrics,
    ready: AtomicBool,
    shut_down: AtomicBool,
    warmup_task: parking_lot::Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl<T: PoolResource> ResourcePool<T> {
    pub fn new(config: PoolConfig, factory: Arc<dyn ResourceFactory<T>>) -> Self {
        Self {
            config,
            factory,
            state: Mutex::new(PoolState {
                warm: VecDeque::new(),
                sessions: HashMap::new(),
            }),
            metrics: PoolMetrics::new(),
            ready: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            warmup_task: parking_lot::Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Whether this pool caches dedicated per-session resources
    pub fn session_awareness(&self) -> bool {
        self.config.session_awareness
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    /// Fill the warm queue and start the background task
    ///
    /// Warm-up failures are logged and counted but never block: the
    /// resource is enqueued unwarmed. A factory failure stops the fill -
    /// later acquisitions fall back to cold construction.
    pub async fn prepare(self: &Arc<Self>) {
        for _ in 0..self.config.warm_pool_size {
            match self.factory.create().await {
                Ok(resource) => {
                    self.warm_resource(&resource).await;
                    let mut state = self.state.lock().await;
                    state.warm.push_back(Arc::new(resource));
                },
                Err(e) => {
                    tracing::warn!(
                        pool = %self.config.name,
                        error = %e,
                        "Warm pool fill failed, remaining slots left cold"
                    );
                    self.metrics.warmup_failures.fetch_add(1, Ordering::Relaxed);
                    break;
                },
            }
        }

        if self.config.enable_background_warmup {
            self.start_warmup_task();
        }

        self.ready.store(true, Ordering::Release);

        let state = self.state.lock().await;
        tracing::info!(
            pool = %self.config.name,
            warm = state.warm.len(),
            target = self.config.warm_pool_size,
            background = self.config.enable_background_warmup,
            "Resource pool prepared"
        );
    }

    /// Stop the background task, drain the warm queue, clear the session
    /// cache
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.ready.store(false, Ordering::Release);

        let task = self.warmup_task.lock().take();
        if let Some((shutdown_tx, handle)) = task {
            let _ = shutdown_tx.send(true);
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                tracing::warn!(
                    pool = %self.config.name,
                    "Warmup task did not stop in time, aborting"
                );
                abort.abort();
            }
        }

        let mut state = self.state.lock().await;
        state.warm.clear();
        for (_, entry) in state.sessions.drain() {
            entry.resource.clear_session_state();
        }

        tracing::info!(pool = %self.config.name, "Resource pool shut down");
    }

    /// Acquire a resource: warm pop if available, immediate cold
    /// construction otherwise
    ///
    /// Never waits for warm supply.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<Arc<T>, PoolError> {
        self.acquire_with_tier(timeout).await.map(|(r, _)| r)
    }

    /// `acquire` plus the tier actually used
    pub async fn acquire_with_tier(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(Arc<T>, AllocationTier), PoolError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }

        let warm = {
            let mut state = self.state.lock().await;
            state.warm.pop_front()
        };

        if let Some(resource) = warm {
            self.record_allocation(AllocationTier::Warm);
            return Ok((resource, AllocationTier::Warm));
        }

        let resource = self.construct_cold(timeout).await?;
        self.record_allocation(AllocationTier::Cold);
        Ok((resource, AllocationTier::Cold))
    }

    /// Return a non-session resource to the pool
    ///
    /// Per-session state is wiped before the handle re-enters the warm
    /// queue; with no spare capacity the handle is discarded.
    pub async fn release(&self, resource: Arc<T>) {
        resource.clear_session_state();

        let mut state = self.state.lock().await;
        if state.warm.len() < self.config.warm_pool_size {
            state.warm.push_back(resource);
        }
    }

    /// Acquire with session affinity
    ///
    /// With session awareness disabled or no session id, behaves exactly
    /// like [`acquire_with_tier`](Self::acquire_with_tier). Otherwise a
    /// cache hit that is still ready returns the dedicated handle; a stale
    /// hit is evicted and re-acquired transparently. The whole
    /// lookup-evict-construct-insert sequence holds the pool lock, so two
    /// concurrent callers for the same new session id produce one
    /// construction and share the result.
    pub async fn acquire_for_session(
        &self,
        session_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(Arc<T>, AllocationTier), PoolError> {
        let sid = match session_id {
            Some(s) if !s.is_empty() && self.config.session_awareness => s,
            _ => return self.acquire_with_tier(timeout).await,
        };

        if self.shut_down.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }

        let mut state = self.state.lock().await;

        if let Some(entry) = state.sessions.get_mut(sid) {
            if entry.resource.is_ready() {
                entry.last_used = Instant::now();
                self.record_allocation(AllocationTier::Dedicated);
                return Ok((entry.resource.clone(), AllocationTier::Dedicated));
            }

            tracing::debug!(
                pool = %self.config.name,
                session = %sid,
                "Cached session resource not ready, evicting"
            );
            if let Some(stale) = state.sessions.remove(sid) {
                stale.resource.clear_session_state();
            }
        }

        let (resource, tier) = match state.warm.pop_front() {
            Some(r) => (r, AllocationTier::Warm),
            // Lock intentionally held across construction: only one caller
            // constructs for a new session id, the rest observe the cache
            None => (self.construct_cold(timeout).await?, AllocationTier::Cold),
        };

        state.sessions.insert(
            sid.to_string(),
            SessionEntry {
                resource: resource.clone(),
                last_used: Instant::now(),
            },
        );

        self.record_allocation(tier);
        Ok((resource, tier))
    }

    /// Discard a session's dedicated resource
    ///
    /// Session-bound handles may carry per-session customization, so they
    /// never re-enter the warm queue. Returns whether a cache entry was
    /// found; with session awareness disabled (or no id) the resource is
    /// wiped and `true` is returned without touching the queue.
    pub async fn release_for_session(
        &self,
        session_id: Option<&str>,
        resource: Option<&Arc<T>>,
    ) -> bool {
        let sid = match session_id {
            Some(s) if !s.is_empty() && self.config.session_awareness => s,
            _ => {
                if let Some(r) = resource {
                    r.clear_session_state();
                }
                return true;
            },
        };

        let mut state = self.state.lock().await;
        match state.sessions.remove(sid) {
            Some(entry) => {
                entry.resource.clear_session_state();
                tracing::debug!(
                    pool = %self.config.name,
                    session = %sid,
                    "Session resource discarded"
                );
                true
            },
            None => false,
        }
    }

    /// Point-in-time diagnostic view; never mutates state
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        PoolSnapshot {
            name: self.config.name.clone(),
            taken_at: chrono::Utc::now(),
            ready: self.ready.load(Ordering::Acquire),
            warm_pool_size: state.warm.len(),
            warm_pool_target: self.config.warm_pool_size,
            session_awareness: self.config.session_awareness,
            active_sessions: state.sessions.len(),
            background_warmup: self.config.enable_background_warmup,
            metrics: self.metrics.snapshot(),
        }
    }

    async fn construct_cold(&self, timeout: Option<Duration>) -> Result<Arc<T>, PoolError> {
        let bound = timeout.unwrap_or(self.config.acquire_timeout);
        let resource = tokio::time::timeout(bound, self.factory.create())
            .await
            .map_err(|_| PoolError::AcquireTimeout)??;
        self.warm_resource(&resource).await;
        Ok(Arc::new(resource))
    }

    /// Best-effort pre-warming; failures are counted, never propagated
    async fn warm_resource(&self, resource: &T) {
        match self.factory.warm(resource).await {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(pool = %self.config.name, "Resource warm-up declined");
                self.metrics.warmup_failures.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                tracing::warn!(pool = %self.config.name, error = %e, "Resource warm-up failed");
                self.metrics.warmup_failures.fetch_add(1, Ordering::Relaxed);
            },
        }
    }

    fn record_allocation(&self, tier: AllocationTier) {
        self.metrics.allocations_total.fetch_add(1, Ordering::Relaxed);
        let counter = match tier {
            AllocationTier::Dedicated => &self.metrics.allocations_dedicated,
            AllocationTier::Warm => &self.metrics.allocations_warm,
            AllocationTier::Cold => &self.metrics.allocations_cold,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Start the periodic refill/eviction task
    fn start_warmup_task(self: &Arc<Self>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let pool = Arc::clone(self);
        let interval = pool.config.warmup_interval;

        let handle = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the cycle cadence
            // starts one interval after prepare
            interval_timer.tick().await;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        pool.evict_stale_sessions().await;
                        pool.refill_warm_queue().await;
                        pool.metrics.warmup_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!(pool = %pool.config.name, "Warmup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        *self.warmup_task.lock() = Some((shutdown_tx, handle));
    }

    /// Refill the warm queue to target
    ///
    /// Construction happens outside the pool lock so acquires are not
    /// blocked behind slow factories; capacity is re-checked before each
    /// push in case a release refilled the queue concurrently.
    async fn refill_warm_queue(&self) {
        let deficit = {
            let state = self.state.lock().await;
            self.config.warm_pool_size.saturating_sub(state.warm.len())
        };

        for _ in 0..deficit {
            match self.factory.create().await {
                Ok(resource) => {
                    self.warm_resource(&resource).await;
                    let mut state = self.state.lock().await;
                    if state.warm.len() < self.config.warm_pool_size {
                        state.warm.push_back(Arc::new(resource));
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        pool = %self.config.name,
                        error = %e,
                        "Warm queue refill failed"
                    );
                    self.metrics.warmup_failures.fetch_add(1, Ordering::Relaxed);
                    break;
                },
            }
        }
    }

    /// Evict session entries untouched for longer than the max age
    async fn evict_stale_sessions(&self) {
        let max_age = self.config.session_max_age;
        let mut state = self.state.lock().await;

        let stale: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, entry)| entry.last_used.elapsed() > max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            if let Some(entry) = state.sessions.remove(&id) {
                entry.resource.clear_session_state();
                tracing::info!(
                    pool = %self.config.name,
                    session = %id,
                    "Evicted stale session resource"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct TestResource {
        #[allow(dead_code)]
        id: usize,
        ready: AtomicBool,
        clears: AtomicUsize,
    }

    impl TestResource {
        fn new(id: usize) -> Self {
            Self {
                id,
                ready: AtomicBool::new(true),
                clears: AtomicUsize::new(0),
            }
        }
    }

    impl PoolResource for TestResource {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn clear_session_state(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct TestFactory {
        created: AtomicUsize,
        create_delay: Option<Duration>,
        warm_ok: Option<bool>,
    }

    impl TestFactory {
        fn slow(delay: Duration) -> Self {
            Self {
                create_delay: Some(delay),
                ..Default::default()
            }
        }

        fn failing_warm() -> Self {
            Self {
                warm_ok: Some(false),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ResourceFactory<TestResource> for TestFactory {
        async fn create(&self) -> Result<TestResource, PoolError> {
            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(TestResource::new(id))
        }

        async fn warm(&self, _resource: &TestResource) -> Result<bool, PoolError> {
            Ok(self.warm_ok.unwrap_or(true))
        }
    }

    fn test_config(warm: usize, background: bool) -> PoolConfig {
        PoolConfig {
            name: "test".to_string(),
            warm_pool_size: warm,
            session_awareness: true,
            enable_background_warmup: background,
            warmup_interval: Duration::from_millis(50),
            session_max_age: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(1),
        }
    }

    fn test_pool(warm: usize) -> Arc<ResourcePool<TestResource>> {
        Arc::new(ResourcePool::new(
            test_config(warm, false),
            Arc::new(TestFactory::default()),
        ))
    }

    #[tokio::test]
    async fn test_session_affinity() {
        let pool = test_pool(2);
        pool.prepare().await;

        let (first, _) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        let (second, tier) = pool.acquire_for_session(Some("s1"), None).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tier, AllocationTier::Dedicated);
    }

    #[tokio::test]
    async fn test_warm_pool_bound() {
        let pool = test_pool(2);
        pool.prepare().await;

        let (_, t1) = pool.acquire_with_tier(None).await.unwrap();
        let (_, t2) = pool.acquire_with_tier(None).await.unwrap();
        let (_, t3) = pool.acquire_with_tier(None).await.unwrap();

        assert_eq!(t1, AllocationTier::Warm);
        assert_eq!(t2, AllocationTier::Warm);
        assert_eq!(t3, AllocationTier::Cold);
    }

    #[tokio::test]
    async fn test_idempotent_session_release() {
        let pool = test_pool(1);
        pool.prepare().await;

        pool.acquire_for_session(Some("s1"), None).await.unwrap();

        assert!(pool.release_for_session(Some("s1"), None).await);
        assert!(!pool.release_for_session(Some("s1"), None).await);
    }

    #[tokio::test]
    async fn test_session_release_discards_instead_of_requeueing() {
        let pool = test_pool(1);
        pool.prepare().await;

        let (resource, _) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        pool.release_for_session(Some("s1"), Some(&resource)).await;

        let snap = pool.snapshot().await;
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.warm_pool_size, 0);
        assert_eq!(resource.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_ready_entry_evicted_transparently() {
        let pool = test_pool(2);
        pool.prepare().await;

        let (first, _) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        first.ready.store(false, Ordering::SeqCst);

        let (second, tier) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(tier, AllocationTier::Dedicated);
    }

    #[tokio::test]
    async fn test_stale_eviction_by_background_task() {
        let config = PoolConfig {
            session_max_age: Duration::from_millis(30),
            ..test_config(0, true)
        };
        let pool = Arc::new(ResourcePool::new(config, Arc::new(TestFactory::default())));
        pool.prepare().await;

        let (first, _) = pool.acquire_for_session(Some("s1"), None).await.unwrap();

        // Wait past the max age plus one warmup interval
        tokio::time::sleep(Duration::from_millis(150)).await;

        let (second, tier) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(tier, AllocationTier::Dedicated);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_background_refill() {
        let pool = Arc::new(ResourcePool::new(
            test_config(2, true),
            Arc::new(TestFactory::default()),
        ));
        pool.prepare().await;

        pool.acquire(None).await.unwrap();
        pool.acquire(None).await.unwrap();
        assert_eq!(pool.snapshot().await.warm_pool_size, 0);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(pool.snapshot().await.warm_pool_size, 2);

        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_duplicate_cold_construction() {
        let factory = Arc::new(TestFactory::slow(Duration::from_millis(50)));
        let pool = Arc::new(ResourcePool::new(test_config(0, false), factory.clone()));
        pool.prepare().await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.acquire_for_session(Some("fresh"), None).await.unwrap()
            }));
        }

        let mut resources = Vec::new();
        for handle in handles {
            resources.push(handle.await.unwrap().0);
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        for r in &resources[1..] {
            assert!(Arc::ptr_eq(&resources[0], r));
        }
    }

    #[tokio::test]
    async fn test_warmup_failure_is_nonfatal() {
        let pool = Arc::new(ResourcePool::new(
            test_config(2, false),
            Arc::new(TestFactory::failing_warm()),
        ));
        pool.prepare().await;

        let snap = pool.snapshot().await;
        assert_eq!(snap.warm_pool_size, 2);
        assert_eq!(snap.metrics.warmup_failures, 2);
    }

    #[tokio::test]
    async fn test_release_requeues_up_to_capacity() {
        let pool = test_pool(1);
        pool.prepare().await;

        let first = pool.acquire(None).await.unwrap();
        let second = pool.acquire(None).await.unwrap();

        pool.release(first).await;
        pool.release(second).await;

        assert_eq!(pool.snapshot().await.warm_pool_size, 1);
    }

    #[tokio::test]
    async fn test_shutdown_idempotent() {
        let pool = test_pool(2);
        pool.prepare().await;
        pool.acquire_for_session(Some("s1"), None).await.unwrap();

        pool.shutdown().await;
        pool.shutdown().await;

        let snap = pool.snapshot().await;
        assert!(!snap.ready);
        assert_eq!(snap.warm_pool_size, 0);
        assert_eq!(snap.active_sessions, 0);
        assert!(matches!(
            pool.acquire(None).await,
            Err(PoolError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let factory = Arc::new(TestFactory::slow(Duration::from_millis(200)));
        let pool = Arc::new(ResourcePool::new(test_config(0, false), factory));
        pool.prepare().await;

        let result = pool.acquire(Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(PoolError::AcquireTimeout)));
    }

    /// End-to-end allocation walk: warm pops, dedication, discard-on-release,
    /// cold fallback
    #[tokio::test]
    async fn test_allocation_scenario() {
        let pool = test_pool(2);
        pool.prepare().await;
        assert_eq!(pool.snapshot().await.warm_pool_size, 2);

        let (r1, tier) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        assert_eq!(tier, AllocationTier::Warm);
        assert_eq!(pool.snapshot().await.warm_pool_size, 1);

        let (r1_again, tier) = pool.acquire_for_session(Some("s1"), None).await.unwrap();
        assert_eq!(tier, AllocationTier::Dedicated);
        assert!(Arc::ptr_eq(&r1, &r1_again));

        assert!(pool.release_for_session(Some("s1"), Some(&r1)).await);
        let snap = pool.snapshot().await;
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.warm_pool_size, 1);

        let (_, tier) = pool.acquire_with_tier(None).await.unwrap();
        assert_eq!(tier, AllocationTier::Warm);
        assert_eq!(pool.snapshot().await.warm_pool_size, 0);

        let (_, tier) = pool.acquire_with_tier(None).await.unwrap();
        assert_eq!(tier, AllocationTier::Cold);
    }
}
