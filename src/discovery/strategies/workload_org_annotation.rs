//! workload-org-annotation: workloads that declare the org ID they write as.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes, tenant_candidates};
use crate::cluster::{MAX_CONCURRENT_REQUESTS, WorkloadKind, list_all_workloads};
use crate::discovery::matcher::extract_org_id;
use crate::discovery::types::{TenantDetails, TenantEntity};
use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

/// Strategy: a workload in the namespace carries an org ID label or annotation.
pub struct WorkloadOrgAnnotationStrategy;

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for WorkloadOrgAnnotationStrategy {
    fn id(&self) -> &'static str {
        codes::WORKLOAD_ORG_ANNOTATION
    }

    fn description(&self) -> &'static str {
        "Workload declares an X-Scope-OrgID style label or annotation"
    }

    fn default_confidence(&self) -> f64 {
        0.8
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
                .map(|ns| list_all_workloads(ctx.accessor, &ns.name, None))
                .collect::<Vec<_>>(),
        )
        .buffered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        for (ns, (workloads, errors)) in namespaces.iter().zip(listings) {
            if errors.len() < WorkloadKind::ALL.len() {
                scan.read_ok();
            }
            for error in errors {
                scan.read_failed(format!("workloads in {}", ns.name), error);
            }

            let found = workloads.iter().find_map(|w| {
                extract_org_id(&ctx.rules.org_id_keys, &w.labels, &w.annotations)
                    .map(|org_id| (w, org_id))
            });

            if let Some((workload, org_id)) = found {
                log::trace!(
                    "{} {}/{} declares org ID {}",
                    workload.kind,
                    ns.name,
                    workload.name,
                    org_id
                );
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
                    .with_annotation(
                        "mimir-discovery/org-id-source",
                        format!("{}/{}", workload.kind, workload.name),
                    ),
                );
            }
        }

        scan.finish()
    }
}
