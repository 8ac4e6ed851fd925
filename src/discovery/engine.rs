//! One full discovery cycle per inventory.
//!
//! A cycle resolves the home namespace, runs every registered strategy,
//! consolidates their findings and cross-validates the merged entities. The
//! engine holds no mutable state, so cycles for both inventories can run
//! at the same time and an abandoned cycle leaves nothing behind.

use super::consolidation::consolidate;
use super::election::{
    NamespaceCandidate, home_from_ranking, rank_namespaces, resolve_home_namespace,
};
use super::rules::DiscoveryRules;
use super::strategies::{
    ComponentStrategy, DiscoveryStrategy, StrategyContext, TenantStrategy, component_strategies,
    execute_all, tenant_strategies,
};
use super::types::{
    ComponentDetails, ComprehensiveDiscoveryResult, EntityDetails, HomeNamespace, TenantDetails,
};
use super::validation::cross_validate;
use crate::cluster::ClusterAccessor;
use crate::clock::Clock;
use crate::error::{DiscoveryError, Result};
use std::sync::Arc;
use std::time::Instant;

/// Entity kinds the engine knows how to discover.
pub trait Discoverable: EntityDetails {
    fn strategies(engine: &DiscoveryEngine) -> &[Box<dyn DiscoveryStrategy<Self>>];
}

impl Discoverable for TenantDetails {
    fn strategies(engine: &DiscoveryEngine) -> &[Box<dyn DiscoveryStrategy<Self>>] {
        &engine.tenant_strategies
    }
}

impl Discoverable for ComponentDetails {
    fn strategies(engine: &DiscoveryEngine) -> &[Box<dyn DiscoveryStrategy<Self>>] {
        &engine.component_strategies
    }
}

pub struct DiscoveryEngine {
    accessor: Arc<dyn ClusterAccessor>,
    clock: Arc<dyn Clock>,
    rules: Arc<DiscoveryRules>,
    tenant_strategies: Vec<TenantStrategy>,
    component_strategies: Vec<ComponentStrategy>,
}

impl DiscoveryEngine {
    /// Engine with every built-in strategy registered.
    pub fn new(
        accessor: Arc<dyn ClusterAccessor>,
        clock: Arc<dyn Clock>,
        rules: DiscoveryRules,
    ) -> Self {
        Self {
            accessor,
            clock,
            rules: Arc::new(rules),
            tenant_strategies: tenant_strategies(),
            component_strategies: component_strategies(),
        }
    }

    /// Replace the tenant strategy set.
    pub fn with_tenant_strategies(mut self, strategies: Vec<TenantStrategy>) -> Self {
        self.tenant_strategies = strategies;
        self
    }

    /// Replace the component strategy set.
    pub fn with_component_strategies(mut self, strategies: Vec<ComponentStrategy>) -> Self {
        self.component_strategies = strategies;
        self
    }

    pub fn rules(&self) -> &DiscoveryRules {
        &self.rules
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn accessor(&self) -> &dyn ClusterAccessor {
        self.accessor.as_ref()
    }

    /// Resolve the home namespace without running any strategy.
    pub async fn home_namespace(&self) -> HomeNamespace {
        resolve_home_namespace(self.accessor(), &self.rules).await
    }

    /// Every namespace ranked as an election candidate.
    pub async fn namespace_candidates(&self) -> Result<Vec<NamespaceCandidate>> {
        rank_namespaces(self.accessor(), &self.rules).await
    }

    /// Rank every namespace once and resolve the home namespace from that
    /// ranking.
    pub async fn election(&self) -> Result<(HomeNamespace, Vec<NamespaceCandidate>)> {
        let candidates = self.namespace_candidates().await?;
        let home = home_from_ranking(&self.rules, Ok(candidates.as_slice()));
        Ok((home, candidates))
    }

    pub async fn discover_tenants(&self) -> Result<ComprehensiveDiscoveryResult<TenantDetails>> {
        self.discover::<TenantDetails>().await
    }

    pub async fn discover_components(
        &self,
    ) -> Result<ComprehensiveDiscoveryResult<ComponentDetails>> {
        self.discover::<ComponentDetails>().await
    }

    /// Run one full cycle for inventory `D`, electing the home namespace
    /// first.
    ///
    /// Fails with [`DiscoveryError::AllStrategiesFailed`] when every
    /// implemented strategy failed.
    pub async fn discover<D: Discoverable>(&self) -> Result<ComprehensiveDiscoveryResult<D>> {
        let home_namespace = self.home_namespace().await;
        self.discover_in::<D>(home_namespace).await
    }

    /// Run one cycle for inventory `D` against an already resolved home
    /// namespace, so paired cycles can share a single election.
    pub async fn discover_in<D: Discoverable>(
        &self,
        home_namespace: HomeNamespace,
    ) -> Result<ComprehensiveDiscoveryResult<D>> {
        let started = Instant::now();
        let observed_at = self.clock.now();
        log::debug!(
            "Discovering {} inventory (home namespace {})",
            D::KIND,
            home_namespace.name
        );

        let ctx = StrategyContext {
            accessor: self.accessor(),
            rules: &self.rules,
            home_namespace: &home_namespace.name,
            observed_at,
        };
        let (strategies, errors) = execute_all(D::strategies(self), &ctx).await;

        let implemented = strategies.values().filter(|r| !r.placeholder).count();
        let failed = strategies.values().filter(|r| r.failed).count();
        if implemented > 0 && failed == implemented {
            return Err(DiscoveryError::AllStrategiesFailed {
                inventory: D::KIND.as_str(),
                attempted: implemented,
                errors,
            });
        }

        let consolidated = consolidate(&strategies);
        let validated =
            cross_validate(self.accessor(), consolidated, self.rules.confidence_threshold()).await;

        let result = ComprehensiveDiscoveryResult {
            kind: D::KIND,
            home_namespace,
            total_strategies: strategies.len(),
            successful_strategies: strategies.len() - failed,
            strategies,
            entities: validated.entities,
            dropped_entities: validated.dropped,
            errors,
            duration: started.elapsed(),
            timestamp: observed_at,
        };

        log::info!(
            "{} discovery found {} entities ({}/{} strategies succeeded, {} dropped) in {:?}",
            D::KIND,
            result.entity_count(),
            result.successful_strategies,
            result.total_strategies,
            result.dropped_entities,
            result.duration
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, NamespaceInfo, Operation, WorkloadInfo, WorkloadKind};
    use crate::clock::ManualClock;
    use crate::discovery::strategies::{StrategyScan, codes};
    use crate::discovery::types::{NamespaceSource, TenantEntity};
    use crate::error::ClusterError;
    use async_trait::async_trait;

    fn engine(cluster: InMemoryCluster) -> (Arc<InMemoryCluster>, DiscoveryEngine) {
        let cluster = Arc::new(cluster);
        let engine = DiscoveryEngine::new(
            cluster.clone(),
            Arc::new(ManualClock::default()),
            DiscoveryRules::default(),
        );
        (cluster, engine)
    }

    fn sample_cluster() -> InMemoryCluster {
        InMemoryCluster::new()
            .with_namespace(NamespaceInfo::new("mimir"))
            .with_namespace(NamespaceInfo::new("kube-system"))
            .with_namespace(NamespaceInfo::new("tenant-acme").with_label("tenant", "acme"))
            .with_namespace(NamespaceInfo::new("web"))
            .with_workload(
                WorkloadInfo::new(WorkloadKind::StatefulSet, "mimir", "mimir-ingester")
                    .with_label("app.kubernetes.io/component", "ingester")
                    .with_image("grafana/mimir:2.12.0"),
            )
            .with_workload(WorkloadInfo::new(WorkloadKind::Deployment, "web", "frontend"))
    }

    /// Tenant strategy reporting one fixed entity.
    struct Static(&'static str, f64);

    #[async_trait]
    impl DiscoveryStrategy<TenantDetails> for Static {
        fn id(&self) -> &'static str {
            self.0
        }
        fn description(&self) -> &'static str {
            "static"
        }
        fn default_confidence(&self) -> f64 {
            self.1
        }
        async fn scan(
            &self,
            ctx: &StrategyContext<'_>,
            confidence: f64,
        ) -> Result<StrategyScan<TenantDetails>> {
            let mut scan = StrategyScan::new();
            scan.push(TenantEntity::new(
                "team-a",
                "team-a",
                self.0,
                confidence,
                ctx.observed_at,
                TenantDetails::default(),
            ));
            Ok(scan)
        }
    }

    struct Failing(&'static str);

    #[async_trait]
    impl DiscoveryStrategy<TenantDetails> for Failing {
        fn id(&self) -> &'static str {
            self.0
        }
        fn description(&self) -> &'static str {
            "failing"
        }
        fn default_confidence(&self) -> f64 {
            0.9
        }
        async fn scan(
            &self,
            _ctx: &StrategyContext<'_>,
            _confidence: f64,
        ) -> Result<StrategyScan<TenantDetails>> {
            Err(ClusterError::unavailable("scan", "boom").into())
        }
    }

    #[tokio::test]
    async fn test_component_discovery_corroborates() {
        let (_, engine) = engine(sample_cluster());
        let result = engine.discover_components().await.unwrap();

        assert_eq!(result.home_namespace.name, "mimir");
        assert!(matches!(result.home_namespace.source, NamespaceSource::Elected { .. }));
        assert_eq!(result.total_strategies, 4);

        let ingester = result.find("mimir", "mimir-ingester").unwrap();
        // name pattern, label and image all agree
        assert_eq!(ingester.discovery_methods.len(), 3);
        assert_eq!(ingester.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_tenant_discovery() {
        let (_, engine) = engine(sample_cluster());
        let result = engine.discover_tenants().await.unwrap();

        let acme = result.find("tenant-acme", "tenant-acme").unwrap();
        assert_eq!(acme.details.org_id, "acme");
        assert!(acme.is_corroborated());
        assert!(result.find("web", "web").is_none());
        assert!(result.strategies[codes::REMOTE_WRITE_TRAFFIC].placeholder);
    }

    #[tokio::test]
    async fn test_consolidation_scenario() {
        let (_, engine) = engine(InMemoryCluster::new().with_namespace(NamespaceInfo::new("team-a")));
        let engine = engine.with_tenant_strategies(vec![
            Box::new(Static("name-pattern", 0.9)),
            Box::new(Static("label-match", 0.7)),
        ]);

        let result = engine.discover_tenants().await.unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_partial_failure_isolated() {
        let (_, engine) = engine(InMemoryCluster::new().with_namespace(NamespaceInfo::new("team-a")));
        let engine = engine.with_tenant_strategies(vec![
            Box::new(Failing("a")),
            Box::new(Static("b", 0.9)),
        ]);

        let result = engine.discover_tenants().await.unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.successful_strategies, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("a: "));
    }

    #[tokio::test]
    async fn test_all_strategies_failing_fails_cycle() {
        let (cluster, engine) = engine(sample_cluster());
        cluster.fail(Operation::ListNamespaces);
        cluster.fail(Operation::ListConfigObjects);

        let err = engine.discover_tenants().await.unwrap_err();
        match err {
            DiscoveryError::AllStrategiesFailed {
                inventory,
                attempted,
                errors,
            } => {
                assert_eq!(inventory, "tenant");
                // The placeholder is not counted.
                assert_eq!(attempted, 5);
                assert_eq!(errors.len(), 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_election_ranks_once() {
        let (cluster, engine) = engine(sample_cluster());
        let (home, candidates) = engine.election().await.unwrap();

        assert_eq!(home.name, "mimir");
        assert_eq!(candidates[0].name, "mimir");
        assert_eq!(cluster.calls(Operation::ListNamespaces), 1);
    }

    #[tokio::test]
    async fn test_discover_in_skips_election() {
        let (cluster, engine) = engine(sample_cluster());
        let home = engine.home_namespace().await;
        cluster.reset_calls();

        let result = engine.discover_in::<ComponentDetails>(home.clone()).await.unwrap();
        assert_eq!(result.home_namespace, home);
        // Component strategies stay inside the home namespace; only an
        // election lists namespaces.
        assert_eq!(cluster.calls(Operation::ListNamespaces), 0);

        engine.discover_components().await.unwrap();
        assert_eq!(cluster.calls(Operation::ListNamespaces), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_dropped() {
        let (_, engine) = engine(InMemoryCluster::new());
        let engine = engine.with_tenant_strategies(vec![Box::new(Static("weak", 0.55))]);

        // 0.55 * 0.8 for the missing namespace
        let result = engine.discover_tenants().await.unwrap();
        assert!(result.entities.is_empty());
        assert_eq!(result.dropped_entities, 1);
    }
}
