//! namespace-label: namespaces carrying a tenant label.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes, tenant_candidates};
use crate::discovery::types::{TenantDetails, TenantEntity};
use crate::error::Result;
use async_trait::async_trait;

/// Strategy: a configured tenant label key is set on the namespace.
pub struct NamespaceLabelStrategy;

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for NamespaceLabelStrategy {
    fn id(&self) -> &'static str {
        codes::NAMESPACE_LABEL
    }

    fn description(&self) -> &'static str {
        "Namespace carries a tenant label; its value is the org ID"
    }

    fn default_confidence(&self) -> f64 {
        0.7
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
            // First configured key with a non-empty value wins.
            let org_id = ctx.rules.tenant_label_keys.iter().find_map(|key| {
                ns.labels
                    .get(key)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
            });

            if let Some(org_id) = org_id {
                scan.push(
                    TenantEntity::new(
                        &ns.name,
                        &ns.name,
                        self.id(),
                        confidence,
                        ctx.observed_at,
                        TenantDetails::new(org_id),
                    )
                    .with_labels(&ns.labels)
                    .with_annotations(&ns.annotations),
                );
            }
        }

        Ok(scan)
    }
}
