use std::sync::Arc;
use std::time::Duration;

use mimir_discovery::{
    CacheConfig, DiscoveryCache, DiscoveryEngine, DiscoveryRules, InMemoryCluster, ManualClock,
    NamespaceInfo, RefreshTarget,
    cluster::{Operation, WorkloadInfo, WorkloadKind},
    config::DiscoveryConfig,
    discovery::InventoryKind,
};

struct Harness {
    cluster: Arc<InMemoryCluster>,
    clock: Arc<ManualClock>,
    cache: Arc<DiscoveryCache>,
}

fn harness() -> Harness {
    let cluster = Arc::new(
        InMemoryCluster::new()
            .with_namespace(NamespaceInfo::new("mimir"))
            .with_namespace(NamespaceInfo::new("team-a").with_label("tenant", "team-a"))
            .with_workload(
                WorkloadInfo::new(WorkloadKind::StatefulSet, "mimir", "mimir-ingester")
                    .with_image("grafana/mimir:2.12.0"),
            ),
    );
    let clock = Arc::new(ManualClock::default());
    let rules = DiscoveryRules::from_config(&DiscoveryConfig::new().with_home_namespace("mimir"))
        .unwrap();
    let engine = DiscoveryEngine::new(cluster.clone(), clock.clone(), rules);
    let config = CacheConfig::default()
        .with_tenant_ttl(Duration::from_secs(300))
        .with_component_ttl(Duration::from_secs(600));
    let cache = Arc::new(DiscoveryCache::new(Arc::new(engine), &config));
    Harness {
        cluster,
        clock,
        cache,
    }
}

#[tokio::test]
async fn serves_snapshot_until_ttl_lapses() {
    let h = harness();

    let first = h.cache.get_component_inventory().await.unwrap();
    assert!(first.find("mimir", "mimir-ingester").is_some());

    h.cluster.reset_calls();
    h.clock.advance(Duration::from_secs(599));
    let again = h.cache.get_component_inventory().await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(h.cluster.total_calls(), 0);

    h.clock.advance(Duration::from_secs(2));
    let refreshed = h.cache.get_component_inventory().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert!(h.cluster.total_calls() > 0);
}

#[tokio::test]
async fn inventories_expire_independently() {
    let h = harness();
    h.cache.warm_up().await.unwrap();

    h.clock.advance(Duration::from_secs(301));
    let status = h.cache.status();
    assert!(!status.tenants.is_valid);
    assert!(status.components.is_valid);

    h.cache.refresh_expired().await.unwrap();
    let status = h.cache.status();
    assert_eq!(status.tenants.refresh_count, 2);
    assert_eq!(status.components.refresh_count, 1);
}

#[tokio::test]
async fn forced_refresh_picks_up_cluster_changes() {
    let h = harness();
    let before = h.cache.get_component_inventory().await.unwrap();
    assert!(before.find("mimir", "mimir-compactor").is_none());

    h.cluster.add_workload(
        WorkloadInfo::new(WorkloadKind::StatefulSet, "mimir", "mimir-compactor")
            .with_image("grafana/mimir:2.12.0"),
    );
    // Still inside the TTL, so reads keep the old view.
    let cached = h.cache.get_component_inventory().await.unwrap();
    assert!(cached.find("mimir", "mimir-compactor").is_none());

    h.cache.force_refresh(RefreshTarget::Component).await.unwrap();
    let after = h.cache.get_component_inventory().await.unwrap();
    assert!(after.find("mimir", "mimir-compactor").is_some());
}

#[tokio::test]
async fn failed_refresh_keeps_serving_previous_snapshot() {
    let h = harness();
    let original = h.cache.get_tenant_inventory().await.unwrap();

    h.cluster.fail(Operation::ListNamespaces);
    h.cluster.fail(Operation::ListConfigObjects);
    h.cluster.fail(Operation::ListWorkloads);
    h.cluster.fail(Operation::ListIngresses);
    assert!(h.cache.force_refresh(RefreshTarget::Tenant).await.is_err());

    let status = h.cache.status();
    assert!(status.tenants.is_cached);
    assert!(status.tenants.last_error.is_some());
    let still = h.cache.get_tenant_inventory().await.unwrap();
    assert!(Arc::ptr_eq(&original, &still));

    h.cluster.heal();
    h.cache.force_refresh(RefreshTarget::Tenant).await.unwrap();
    assert!(h.cache.status().tenants.last_error.is_none());
}

#[tokio::test]
async fn expired_inventory_outlives_cluster_outage() {
    let h = harness();
    let original = h.cache.get_component_inventory().await.unwrap();

    h.clock.advance(Duration::from_secs(601));
    h.cluster.fail(Operation::ListWorkloads);
    h.cluster.fail(Operation::ListServices);

    let readers = (0..8).map(|_| {
        let cache = h.cache.clone();
        tokio::spawn(async move { cache.get_component_inventory().await })
    });
    for reader in futures_util::future::join_all(readers).await {
        let served = reader.unwrap().unwrap();
        assert!(Arc::ptr_eq(&original, &served));
    }

    let status = h.cache.status();
    assert!(!status.components.is_valid);
    assert!(status.components.last_error.is_some());
    assert_eq!(status.components.refresh_count, 1);
}

#[tokio::test]
async fn concurrent_readers_share_one_cycle() {
    let h = harness();
    let readers = (0..8).map(|_| {
        let cache = h.cache.clone();
        tokio::spawn(async move { cache.get_tenant_inventory().await.map(|r| r.entity_count()) })
    });
    for reader in futures_util::future::join_all(readers).await {
        assert!(reader.unwrap().is_ok());
    }
    assert_eq!(h.cache.status().tenants.refresh_count, 1);
}

#[tokio::test]
async fn invalidate_and_status_report() {
    let h = harness();
    h.cache.warm_up().await.unwrap();
    h.cache.invalidate(InventoryKind::Tenant);

    let status = h.cache.status();
    assert!(!status.tenants.is_cached);
    assert!(status.components.is_cached);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["tenants"]["ttl_secs"], 300);
    assert_eq!(json["components"]["ttl_secs"], 600);
    assert_eq!(json["config"]["background_refresh_running"], false);
}

#[tokio::test(start_paused = true)]
async fn background_loop_starts_and_stops() {
    let h = harness();
    h.cache.warm_up().await.unwrap();

    assert!(h.cache.start_background_refresh());
    assert!(!h.cache.start_background_refresh());
    assert!(h.cache.status().config.background_refresh_running);

    h.cache.stop_background_refresh().await;
    assert!(!h.cache.status().config.background_refresh_running);
}
