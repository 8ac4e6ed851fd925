//! service-match: services fronting system components.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes};
use crate::discovery::matcher::normalize_service_name;
use crate::discovery::types::{ComponentDetails, ComponentEntity, ComponentType};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Strategy: a service's name or metadata matches component keywords.
pub struct ServiceMatchStrategy;

#[async_trait]
impl DiscoveryStrategy<ComponentDetails> for ServiceMatchStrategy {
    fn id(&self) -> &'static str {
        codes::SERVICE_MATCH
    }

    fn description(&self) -> &'static str {
        "Service name or metadata matches component keywords"
    }

    fn default_confidence(&self) -> f64 {
        0.6
    }

    async fn scan(
        &self,
        ctx: &StrategyContext<'_>,
        confidence: f64,
    ) -> Result<StrategyScan<ComponentDetails>> {
        let services = ctx.accessor.list_services(ctx.home_namespace, None).await?;
        let mut scan = StrategyScan::new();
        scan.scanned = services.len();

        // A headless twin shares its identity with the regular service.
        let mut seen = HashSet::new();
        for service in &services {
            let name = normalize_service_name(&service.name);
            if !ctx
                .rules
                .is_system_evidence(name, &service.labels, &service.annotations)
                || !seen.insert(name.to_string())
            {
                continue;
            }

            scan.push(
                ComponentEntity::new(
                    &service.namespace,
                    name,
                    self.id(),
                    confidence,
                    ctx.observed_at,
                    ComponentDetails::of_type(ComponentType::classify(name)),
                )
                .with_labels(&service.labels)
                .with_annotations(&service.annotations),
            );
        }

        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, ServiceInfo};
    use crate::discovery::rules::DiscoveryRules;
    use chrono::{DateTime, Utc};

    #[tokio::test]
    async fn test_headless_services_fold_into_workload_identity() {
        let cluster = InMemoryCluster::new()
            .with_service(ServiceInfo::new("mimir", "mimir-ingester"))
            .with_service(ServiceInfo::new("mimir", "mimir-ingester-headless"))
            .with_service(ServiceInfo::new("mimir", "mimir-store-gateway-headless"))
            .with_service(ServiceInfo::new("mimir", "kubernetes"));
        let rules = DiscoveryRules::default();
        let ctx = StrategyContext {
            accessor: &cluster,
            rules: &rules,
            home_namespace: "mimir",
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        };

        let scan = ServiceMatchStrategy.scan(&ctx, 0.6).await.unwrap();
        let keys: Vec<String> = scan.entities.iter().map(|e| e.identity_key()).collect();
        assert_eq!(keys, vec!["mimir:mimir-ingester", "mimir:mimir-store-gateway"]);
        assert_eq!(scan.scanned, 4);
        assert_eq!(scan.matched, 2);
    }
}
