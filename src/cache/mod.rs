//! TTL cache over the discovery engine.
//!
//! Tenant and component inventories are cached independently, each with its
//! own TTL:
//!
//! ```text
//! Empty ──refresh──▶ Valid ──TTL lapses──▶ Expired ──refresh──▶ Valid …
//! ```
//!
//! A read of a `Valid` snapshot takes a read lock and touches nothing else.
//! A read of an `Empty` or `Expired` inventory blocks on a refresh. If that
//! refresh fails, an `Expired` read is served the previous snapshot and only
//! an `Empty` read sees the error. Refreshes are single-flight per inventory:
//! concurrent readers queue on an async gate and take the outcome of the
//! cycle that finished while they waited, so an expiry triggers exactly one
//! discovery cycle whether it succeeds or fails.
//!
//! Paired refreshes of both inventories share one home namespace election.
//!
//! The snapshot lock is never held across a cluster call. It is taken to
//! read the current snapshot and again to swap in the new `Arc`. A failed,
//! timed-out or cancelled cycle leaves the previous snapshot in place.

pub mod refresh;
pub mod status;

pub use refresh::BackgroundRefresh;
pub use status::{CacheSettings, CacheStatus, InventoryStatus};

use crate::clock::elapsed_between;
use crate::config::CacheConfig;
use crate::discovery::{
    ComponentDetails, ComprehensiveDiscoveryResult, Discoverable, DiscoveryEngine, HomeNamespace,
    InventoryKind, TenantDetails,
};
use crate::error::{DiscoveryError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Home namespace resolved at most once and shared by the cycles that use it.
type SharedHome = OnceCell<HomeNamespace>;

/// Which inventories a forced refresh covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTarget {
    Tenant,
    Component,
    Both,
}

struct Snapshot<D> {
    result: Arc<ComprehensiveDiscoveryResult<D>>,
    last_updated: DateTime<Utc>,
}

/// Cached state of one inventory.
pub struct InventorySlot<D> {
    snapshot: RwLock<Option<Arc<Snapshot<D>>>>,
    refresh_gate: tokio::sync::Mutex<()>,
    ttl: RwLock<Duration>,
    refresh_count: AtomicU64,
    /// Finished cycles, successful or not
    attempts: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl<D> InventorySlot<D> {
    fn new(ttl: Duration) -> Self {
        Self {
            snapshot: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            ttl: RwLock::new(ttl),
            refresh_count: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    fn current(&self) -> Option<Arc<Snapshot<D>>> {
        self.snapshot.read().clone()
    }

    fn is_valid(&self, snapshot: &Snapshot<D>, now: DateTime<Utc>) -> bool {
        elapsed_between(snapshot.last_updated, now) < *self.ttl.read()
    }

    fn valid_snapshot(&self, now: DateTime<Utc>) -> Option<Arc<Snapshot<D>>> {
        self.current().filter(|s| self.is_valid(s, now))
    }

    /// Swap in a new result. `last_updated` never moves backwards.
    fn install(
        &self,
        result: ComprehensiveDiscoveryResult<D>,
        now: DateTime<Utc>,
    ) -> Arc<ComprehensiveDiscoveryResult<D>> {
        let result = Arc::new(result);
        let mut slot = self.snapshot.write();
        let last_updated = match slot.as_ref() {
            Some(previous) => previous.last_updated.max(now),
            None => now,
        };
        *slot = Some(Arc::new(Snapshot {
            result: result.clone(),
            last_updated,
        }));
        drop(slot);

        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        *self.last_error.write() = None;
        result
    }

    fn status(&self, now: DateTime<Utc>) -> InventoryStatus {
        let ttl = *self.ttl.read();
        let current = self.current();
        let age = current.as_ref().map(|s| elapsed_between(s.last_updated, now));
        InventoryStatus {
            is_cached: current.is_some(),
            last_updated: current.as_ref().map(|s| s.last_updated),
            ttl,
            age,
            is_valid: age.is_some_and(|age| age < ttl),
            entity_count: current.as_ref().map_or(0, |s| s.result.entities.len()),
            refresh_count: self.refresh_count.load(Ordering::SeqCst),
            last_error: self.last_error.read().clone(),
        }
    }
}

/// Inventories that have a slot in the cache.
pub trait Cached: Discoverable {
    #[doc(hidden)]
    fn slot(cache: &DiscoveryCache) -> &InventorySlot<Self>;
}

impl Cached for TenantDetails {
    fn slot(cache: &DiscoveryCache) -> &InventorySlot<Self> {
        &cache.tenants
    }
}

impl Cached for ComponentDetails {
    fn slot(cache: &DiscoveryCache) -> &InventorySlot<Self> {
        &cache.components
    }
}

pub struct DiscoveryCache {
    engine: Arc<DiscoveryEngine>,
    tenants: InventorySlot<TenantDetails>,
    components: InventorySlot<ComponentDetails>,
    refresh_interval: Duration,
    cycle_timeout: Duration,
    background_enabled: AtomicBool,
    background: Mutex<Option<BackgroundRefresh>>,
}

impl DiscoveryCache {
    pub fn new(engine: Arc<DiscoveryEngine>, config: &CacheConfig) -> Self {
        Self {
            engine,
            tenants: InventorySlot::new(config.tenant_ttl()),
            components: InventorySlot::new(config.component_ttl()),
            refresh_interval: config.refresh_interval(),
            cycle_timeout: config.cycle_timeout(),
            background_enabled: AtomicBool::new(config.background_refresh),
            background: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    fn now(&self) -> DateTime<Utc> {
        self.engine.clock().now()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Cached tenant inventory, refreshed first when empty or expired.
    pub async fn get_tenant_inventory(
        &self,
    ) -> Result<Arc<ComprehensiveDiscoveryResult<TenantDetails>>> {
        self.get::<TenantDetails>().await
    }

    /// Cached component inventory, refreshed first when empty or expired.
    pub async fn get_component_inventory(
        &self,
    ) -> Result<Arc<ComprehensiveDiscoveryResult<ComponentDetails>>> {
        self.get::<ComponentDetails>().await
    }

    /// Serve inventory `D`, refreshing first when it is empty or expired.
    ///
    /// A failed refresh of an expired inventory still serves the previous
    /// snapshot; the failure is kept in [`InventoryStatus::last_error`].
    pub async fn get<D: Cached>(&self) -> Result<Arc<ComprehensiveDiscoveryResult<D>>> {
        let slot = D::slot(self);
        if let Some(snapshot) = slot.valid_snapshot(self.now()) {
            return Ok(snapshot.result.clone());
        }

        let seen = slot.attempts.load(Ordering::SeqCst);
        let _gate = slot.refresh_gate.lock().await;
        if let Some(snapshot) = slot.valid_snapshot(self.now()) {
            return Ok(snapshot.result.clone());
        }
        // A cycle finished while we queued: share its outcome.
        if slot.attempts.load(Ordering::SeqCst) != seen {
            if let Some(snapshot) = slot.current() {
                return Ok(snapshot.result.clone());
            }
            if let Some(error) = slot.last_error.read().clone() {
                return Err(DiscoveryError::Refresh {
                    failures: vec![format!("{}: {}", D::KIND, error)],
                });
            }
        }

        match self.run_cycle::<D>(&SharedHome::new()).await {
            Ok(result) => Ok(result),
            Err(e) => slot.current().map(|stale| stale.result.clone()).ok_or(e),
        }
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Discover and install. Callers hold the slot's refresh gate. The
    /// cycle timeout covers the election when this cycle is the one that
    /// runs it.
    async fn run_cycle<D: Cached>(
        &self,
        home: &SharedHome,
    ) -> Result<Arc<ComprehensiveDiscoveryResult<D>>> {
        let slot = D::slot(self);
        let cycle = async {
            let home = home.get_or_init(|| self.engine.home_namespace()).await;
            self.engine.discover_in::<D>(home.clone()).await
        };
        let outcome = match tokio::time::timeout(self.cycle_timeout, cycle).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DiscoveryError::Timeout {
                inventory: D::KIND.as_str(),
                timeout: self.cycle_timeout,
            }),
        };

        let outcome = match outcome {
            Ok(result) => Ok(slot.install(result, self.now())),
            Err(e) => {
                let cached = slot.current().is_some();
                log::warn!(
                    "{} refresh failed{}: {}",
                    D::KIND,
                    if cached { ", keeping previous snapshot" } else { "" },
                    e
                );
                *slot.last_error.write() = Some(e.to_string());
                Err(e)
            }
        };
        slot.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    /// Refresh one inventory regardless of validity.
    pub async fn force_refresh_kind<D: Cached>(
        &self,
    ) -> Result<Arc<ComprehensiveDiscoveryResult<D>>> {
        self.force_refresh_with::<D>(&SharedHome::new()).await
    }

    async fn force_refresh_with<D: Cached>(
        &self,
        home: &SharedHome,
    ) -> Result<Arc<ComprehensiveDiscoveryResult<D>>> {
        let _gate = D::slot(self).refresh_gate.lock().await;
        self.run_cycle::<D>(home).await
    }

    /// Refresh one inventory if it is empty or expired. Returns whether a
    /// cycle ran.
    async fn refresh_if_stale<D: Cached>(&self, home: &SharedHome) -> Result<bool> {
        let slot = D::slot(self);
        if slot.valid_snapshot(self.now()).is_some() {
            return Ok(false);
        }
        let _gate = slot.refresh_gate.lock().await;
        if slot.valid_snapshot(self.now()).is_some() {
            return Ok(false);
        }
        self.run_cycle::<D>(home).await.map(|_| true)
    }

    /// Refresh the targeted inventories regardless of validity. With
    /// [`RefreshTarget::Both`] the two cycles run concurrently over one
    /// election; one failing does not stop the other from being cached.
    pub async fn force_refresh(&self, target: RefreshTarget) -> Result<()> {
        match target {
            RefreshTarget::Tenant => self.force_refresh_kind::<TenantDetails>().await.map(|_| ()),
            RefreshTarget::Component => {
                self.force_refresh_kind::<ComponentDetails>().await.map(|_| ())
            }
            RefreshTarget::Both => {
                let home = SharedHome::new();
                let (tenants, components) = tokio::join!(
                    self.force_refresh_with::<TenantDetails>(&home),
                    self.force_refresh_with::<ComponentDetails>(&home),
                );
                combine(tenants.map(|_| ()), components.map(|_| ()))
            }
        }
    }

    /// Populate both inventories in parallel at startup.
    pub async fn warm_up(&self) -> Result<()> {
        log::info!("Warming up discovery cache");
        self.force_refresh(RefreshTarget::Both).await
    }

    /// Refresh whichever inventories are empty or expired, in parallel.
    pub async fn refresh_expired(&self) -> Result<()> {
        let home = SharedHome::new();
        let (tenants, components) = tokio::join!(
            self.refresh_if_stale::<TenantDetails>(&home),
            self.refresh_if_stale::<ComponentDetails>(&home),
        );
        if let (Ok(t), Ok(c)) = (&tenants, &components)
            && (*t || *c)
        {
            log::debug!("Refreshed expired inventories (tenants: {}, components: {})", t, c);
        }
        combine(tenants.map(|_| ()), components.map(|_| ()))
    }

    /// Drop a snapshot so the next read rediscovers.
    pub fn invalidate(&self, kind: InventoryKind) {
        match kind {
            InventoryKind::Tenant => *self.tenants.snapshot.write() = None,
            InventoryKind::Component => *self.components.snapshot.write() = None,
        }
        log::debug!("Invalidated {} inventory", kind);
    }

    // ------------------------------------------------------------------
    // Tuning and diagnostics
    // ------------------------------------------------------------------

    /// Change an inventory's TTL. Applies from the next validity check.
    pub fn set_ttl(&self, kind: InventoryKind, ttl: Duration) {
        match kind {
            InventoryKind::Tenant => *self.tenants.ttl.write() = ttl,
            InventoryKind::Component => *self.components.ttl.write() = ttl,
        }
    }

    /// Let the background loop do work on its ticks, or idle.
    pub fn enable_background_refresh(&self, enabled: bool) {
        self.background_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_background_refresh_enabled(&self) -> bool {
        self.background_enabled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> CacheStatus {
        let now = self.now();
        CacheStatus {
            tenants: self.tenants.status(now),
            components: self.components.status(now),
            config: CacheSettings {
                background_refresh_enabled: self.is_background_refresh_enabled(),
                background_refresh_running: self
                    .background
                    .lock()
                    .as_ref()
                    .is_some_and(BackgroundRefresh::is_running),
                refresh_interval: self.refresh_interval,
            },
        }
    }

    // ------------------------------------------------------------------
    // Background loop lifecycle
    // ------------------------------------------------------------------

    /// Start the background loop. Returns `false` if it is already running
    /// or the refresh interval is zero.
    pub fn start_background_refresh(self: &Arc<Self>) -> bool {
        if self.refresh_interval.is_zero() {
            log::error!("Background refresh not started: refresh interval is zero");
            return false;
        }
        let mut background = self.background.lock();
        if background.as_ref().is_some_and(BackgroundRefresh::is_running) {
            return false;
        }
        *background = Some(BackgroundRefresh::spawn(
            Arc::downgrade(self),
            self.refresh_interval,
        ));
        true
    }

    /// Stop the background loop and wait for it to exit.
    pub async fn stop_background_refresh(&self) {
        let running = self.background.lock().take();
        if let Some(background) = running {
            background.stop().await;
        }
    }
}

fn combine(tenants: Result<()>, components: Result<()>) -> Result<()> {
    let failures: Vec<String> = [
        (InventoryKind::Tenant, tenants),
        (InventoryKind::Component, components),
    ]
    .into_iter()
    .filter_map(|(kind, r)| r.err().map(|e| format!("{}: {}", kind, e)))
    .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DiscoveryError::Refresh { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, NamespaceInfo, Operation, WorkloadInfo, WorkloadKind};
    use crate::clock::ManualClock;
    use crate::discovery::DiscoveryRules;
    use futures_util::future::join_all;

    const MINUTE: Duration = Duration::from_secs(60);

    struct Harness {
        cluster: Arc<InMemoryCluster>,
        clock: Arc<ManualClock>,
        cache: Arc<DiscoveryCache>,
    }

    fn harness_with(cluster: InMemoryCluster, config: CacheConfig) -> Harness {
        let cluster = Arc::new(cluster);
        let clock = Arc::new(ManualClock::default());
        let engine = DiscoveryEngine::new(cluster.clone(), clock.clone(), DiscoveryRules::default());
        let cache = Arc::new(DiscoveryCache::new(Arc::new(engine), &config));
        Harness {
            cluster,
            clock,
            cache,
        }
    }

    fn harness() -> Harness {
        harness_with(sample_cluster(), CacheConfig::default())
    }

    fn sample_cluster() -> InMemoryCluster {
        InMemoryCluster::new()
            .with_namespace(NamespaceInfo::new("mimir"))
            .with_namespace(NamespaceInfo::new("tenant-a").with_label("tenant", "a"))
            .with_workload(WorkloadInfo::new(
                WorkloadKind::StatefulSet,
                "mimir",
                "mimir-ingester",
            ))
    }

    #[tokio::test]
    async fn test_get_within_ttl_makes_no_cluster_calls() {
        let h = harness();
        h.cache.get_tenant_inventory().await.unwrap();
        h.cluster.reset_calls();

        h.clock.advance(4 * MINUTE);
        let result = h.cache.get_tenant_inventory().await.unwrap();
        assert!(result.find("tenant-a", "tenant-a").is_some());
        assert_eq!(h.cluster.total_calls(), 0);
        assert_eq!(h.cache.status().tenants.refresh_count, 1);
    }

    #[tokio::test]
    async fn test_expired_get_refreshes_once_under_concurrency() {
        let h = harness_with(
            sample_cluster().with_latency(Duration::from_millis(5)),
            CacheConfig::default(),
        );
        h.cache.get_tenant_inventory().await.unwrap();
        h.clock.advance(6 * MINUTE);

        let reads = join_all((0..16).map(|_| h.cache.get_tenant_inventory())).await;
        assert!(reads.iter().all(|r| r.is_ok()));
        assert_eq!(h.cache.status().tenants.refresh_count, 2);
    }

    #[tokio::test]
    async fn test_first_failure_surfaces_and_stays_uncached() {
        let h = harness();
        h.cluster.fail(Operation::ListNamespaces);
        h.cluster.fail(Operation::ListConfigObjects);

        assert!(h.cache.get_tenant_inventory().await.is_err());
        let status = h.cache.status();
        assert!(!status.tenants.is_cached);
        assert!(!status.tenants.is_valid);
        assert!(status.tenants.last_error.is_some());
        assert_eq!(status.tenants.refresh_count, 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let h = harness();
        let first = h.cache.get_tenant_inventory().await.unwrap();

        h.cluster.fail(Operation::ListNamespaces);
        h.cluster.fail(Operation::ListConfigObjects);
        assert!(h.cache.force_refresh(RefreshTarget::Tenant).await.is_err());

        let status = h.cache.status();
        assert!(status.tenants.is_cached);
        assert_eq!(status.tenants.entity_count, first.entity_count());

        // Still served while valid.
        let again = h.cache.get_tenant_inventory().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn test_expired_read_serves_previous_snapshot_when_refresh_fails() {
        let h = harness();
        let first = h.cache.get_tenant_inventory().await.unwrap();

        h.clock.advance(6 * MINUTE);
        h.cluster.fail(Operation::ListNamespaces);
        h.cluster.fail(Operation::ListConfigObjects);

        let stale = h.cache.get_tenant_inventory().await.unwrap();
        assert!(Arc::ptr_eq(&first, &stale));
        let status = h.cache.status();
        assert!(!status.tenants.is_valid);
        assert!(status.tenants.last_error.is_some());
        assert_eq!(status.tenants.refresh_count, 1);

        h.cluster.heal();
        let fresh = h.cache.get_tenant_inventory().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(h.cache.status().tenants.last_error.is_none());
    }

    #[tokio::test]
    async fn test_queued_readers_share_a_failed_cycle() {
        let h = harness_with(
            sample_cluster().with_latency(Duration::from_millis(5)),
            CacheConfig::default(),
        );
        let first = h.cache.get_tenant_inventory().await.unwrap();
        h.clock.advance(6 * MINUTE);
        h.cluster.fail(Operation::ListNamespaces);
        h.cluster.fail(Operation::ListConfigObjects);

        // Cost of a single failing cycle.
        h.cluster.reset_calls();
        assert!(h.cache.force_refresh(RefreshTarget::Tenant).await.is_err());
        let one_cycle = h.cluster.total_calls();
        assert!(one_cycle > 0);

        h.cluster.reset_calls();
        let reads = join_all((0..8).map(|_| h.cache.get_tenant_inventory())).await;
        for read in &reads {
            assert!(Arc::ptr_eq(&first, read.as_ref().unwrap()));
        }
        assert_eq!(h.cluster.total_calls(), one_cycle);
    }

    #[tokio::test]
    async fn test_cold_readers_share_a_failed_cycle() {
        let h = harness_with(
            sample_cluster().with_latency(Duration::from_millis(5)),
            CacheConfig::default(),
        );
        h.cluster.fail(Operation::ListNamespaces);
        h.cluster.fail(Operation::ListConfigObjects);

        assert!(h.cache.force_refresh(RefreshTarget::Tenant).await.is_err());
        let one_cycle = h.cluster.total_calls();

        h.cluster.reset_calls();
        let reads = join_all((0..8).map(|_| h.cache.get_tenant_inventory())).await;
        assert!(reads.iter().all(|r| r.is_err()));
        assert_eq!(h.cluster.total_calls(), one_cycle);
        assert!(!h.cache.status().tenants.is_cached);
    }

    #[tokio::test]
    async fn test_paired_refresh_elects_once() {
        let h = harness();
        // Component strategies never list namespaces, so a component-only
        // cycle lists them exactly once, for its election.
        h.cache.force_refresh(RefreshTarget::Component).await.unwrap();
        assert_eq!(h.cluster.calls(Operation::ListNamespaces), 1);

        h.cluster.reset_calls();
        h.cache.force_refresh(RefreshTarget::Tenant).await.unwrap();
        let tenant_cycle = h.cluster.calls(Operation::ListNamespaces);

        h.cluster.reset_calls();
        h.cache.warm_up().await.unwrap();
        assert_eq!(h.cluster.calls(Operation::ListNamespaces), tenant_cycle);

        h.clock.advance(11 * MINUTE);
        h.cluster.reset_calls();
        h.cache.refresh_expired().await.unwrap();
        assert_eq!(h.cluster.calls(Operation::ListNamespaces), tenant_cycle);
        assert_eq!(h.cache.status().components.refresh_count, 3);
    }

    #[tokio::test]
    async fn test_zero_refresh_interval_never_starts_loop() {
        let h = harness_with(
            sample_cluster(),
            CacheConfig::default().with_refresh_interval(Duration::ZERO),
        );
        assert!(!h.cache.start_background_refresh());
        assert!(!h.cache.status().config.background_refresh_running);
    }

    #[tokio::test]
    async fn test_warm_up_isolates_failures() {
        let h = harness();
        // Component strategies all read workloads or services in the home namespace.
        h.cluster.fail(Operation::ListWorkloads);
        h.cluster.fail(Operation::ListServices);

        let err = h.cache.warm_up().await.unwrap_err();
        match err {
            DiscoveryError::Refresh { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("component: "));
            }
            other => panic!("unexpected error: {other}"),
        }

        let status = h.cache.status();
        assert!(status.tenants.is_cached);
        assert!(!status.components.is_cached);
    }

    #[tokio::test]
    async fn test_set_ttl_and_invalidate() {
        let h = harness();
        h.cache.warm_up().await.unwrap();

        h.cache.set_ttl(InventoryKind::Component, MINUTE);
        h.clock.advance(2 * MINUTE);
        let status = h.cache.status();
        assert!(!status.components.is_valid);
        assert!(status.tenants.is_valid);
        assert_eq!(status.components.age, Some(2 * MINUTE));

        h.cache.invalidate(InventoryKind::Tenant);
        assert!(!h.cache.status().tenants.is_cached);
        h.cache.get_tenant_inventory().await.unwrap();
        assert_eq!(h.cache.status().tenants.refresh_count, 2);
    }

    #[tokio::test]
    async fn test_refresh_expired_only_touches_stale_inventories() {
        let h = harness();
        h.cache.warm_up().await.unwrap();

        h.clock.advance(6 * MINUTE);
        h.cache.refresh_expired().await.unwrap();

        let status = h.cache.status();
        assert_eq!(status.tenants.refresh_count, 2);
        assert_eq!(status.components.refresh_count, 1);
    }

    #[tokio::test]
    async fn test_last_updated_never_regresses() {
        let h = harness();
        h.cache.warm_up().await.unwrap();
        let first = h.cache.status().tenants.last_updated.unwrap();

        h.clock.set(first - chrono::TimeDelta::minutes(10));
        h.cache.force_refresh(RefreshTarget::Tenant).await.unwrap();
        assert_eq!(h.cache.status().tenants.last_updated, Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_timeout_leaves_snapshot() {
        let h = harness_with(
            sample_cluster().with_latency(Duration::from_secs(120)),
            CacheConfig::default(),
        );

        let err = h.cache.get_component_inventory().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Timeout { .. }));
        assert!(!h.cache.status().components.is_cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_loop_refreshes_at_first_expired_tick() {
        let h = harness();
        h.cache.warm_up().await.unwrap();
        assert!(h.cache.start_background_refresh());
        assert!(!h.cache.start_background_refresh());

        for _ in 0..3 {
            h.clock.advance(2 * MINUTE);
            tokio::time::sleep(2 * MINUTE).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = h.cache.status();
        assert_eq!(status.tenants.refresh_count, 2);
        assert_eq!(status.components.refresh_count, 1);
        assert!(status.config.background_refresh_running);

        h.cache.stop_background_refresh().await;
        assert!(!h.cache.status().config.background_refresh_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_background_refresh_idles() {
        let h = harness();
        h.cache.warm_up().await.unwrap();
        h.cache.enable_background_refresh(false);
        h.cache.start_background_refresh();

        h.clock.advance(20 * MINUTE);
        tokio::time::sleep(5 * MINUTE).await;
        assert_eq!(h.cache.status().tenants.refresh_count, 1);

        h.cache.enable_background_refresh(true);
        tokio::time::sleep(2 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(h.cache.status().tenants.refresh_count, 2);

        h.cache.stop_background_refresh().await;
    }
}
