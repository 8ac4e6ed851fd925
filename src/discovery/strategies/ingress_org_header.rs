//! ingress-org-header: ingresses that inject an `X-Scope-OrgID` header.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes, tenant_candidates};
use crate::cluster::MAX_CONCURRENT_REQUESTS;
use crate::discovery::matcher::{extract_org_id, parse_org_id_header};
use crate::discovery::types::{TenantDetails, TenantEntity};
use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

/// Strategy: an ingress in the namespace sets the tenant header.
pub struct IngressOrgHeaderStrategy;

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for IngressOrgHeaderStrategy {
    fn id(&self) -> &'static str {
        codes::INGRESS_ORG_HEADER
    }

    fn description(&self) -> &'static str {
        "Ingress annotations inject an X-Scope-OrgID header"
    }

    fn default_confidence(&self) -> f64 {
        0.75
    }

    async fn scan(
        &self,
        ctx: &StrategyContext<'_>,
        confidence: f64,
    ) -> Result<StrategyScan<TenantDetails>> {
        let namespaces = tenant_candidates(ctx).await?;
        let mut scan = StrategyScan::new();
        scan.scanned = namespaces.len();

        let listings: Vec<_> = stream::iter(
            namespaces
                .iter()
                .map(|ns| ctx.accessor.list_ingresses(&ns.name))
                .collect::<Vec<_>>(),
        )
        .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        for (ns, listing) in namespaces.iter().zip(listings) {
            let ingresses = match listing {
                Ok(ingresses) => {
                    scan.read_ok();
                    ingresses
                }
                Err(e) => {
                    scan.read_failed(format!("ingresses in {}", ns.name), e);
                    continue;
                }
            };

            // Explicit org ID keys first, then header snippets in any annotation.
            let org_id = ingresses.iter().find_map(|ing| {
                extract_org_id(&ctx.rules.org_id_keys, &ing.labels, &ing.annotations)
                    .or_else(|| ing.annotations.values().find_map(|v| parse_org_id_header(v)))
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
                    .with_labels(&ns.labels),
                );
            }
        }

        scan.finish()
    }
}
