//! namespace-name-pattern: namespaces named like tenants.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes, tenant_candidates};
use crate::discovery::types::{TenantDetails, TenantEntity};
use crate::error::Result;
use async_trait::async_trait;

/// Strategy: namespace name matches a tenant namespace pattern.
pub struct NamespaceNamePatternStrategy;

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for NamespaceNamePatternStrategy {
    fn id(&self) -> &'static str {
        codes::NAMESPACE_NAME_PATTERN
    }

    fn description(&self) -> &'static str {
        "Namespace name matches a tenant namespace pattern"
    }

    fn default_confidence(&self) -> f64 {
        0.6
    }

    async fn scan(
        &self,
        ctx: &StrategyContext<'_>,
        confidence: f64,
    ) -> Result<StrategyScan<TenantDetails>> {
        let namespaces = tenant_candidates(ctx).await?;
        let mut scan = StrategyScan::new();
        scan.scanned = namespaces.len();

        for ns in namespaces {
            let Some(pattern) = ctx.rules.matching_tenant_pattern(&ns.name) else {
                continue;
            };
            log::trace!("Namespace {} matches tenant pattern {}", ns.name, pattern.as_str());
            scan.push(
                TenantEntity::new(
                    &ns.name,
                    &ns.name,
                    self.id(),
                    confidence,
                    ctx.observed_at,
                    TenantDetails::default(),
                )
                .with_labels(&ns.labels)
                .with_annotations(&ns.annotations),
            );
        }

        Ok(scan)
    }
}
