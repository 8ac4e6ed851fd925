//! workload-label: workloads whose recommended labels name a component.

use super::{
    COMPONENT_LABEL_KEYS, DiscoveryStrategy, StrategyContext, StrategyScan, codes,
    component_from_workload, scan_workloads,
};
use crate::discovery::types::ComponentDetails;
use crate::error::Result;
use async_trait::async_trait;

/// Strategy: `app.kubernetes.io/*` labels identify a component.
pub struct WorkloadLabelStrategy;

#[async_trait]
impl DiscoveryStrategy<ComponentDetails> for WorkloadLabelStrategy {
    fn id(&self) -> &'static str {
        codes::WORKLOAD_LABEL
    }

    fn description(&self) -> &'static str {
        "app.kubernetes.io component, name or part-of label names a component"
    }

    fn default_confidence(&self) -> f64 {
        0.7
    }

    async fn scan(
        &self,
        ctx: &StrategyContext<'_>,
        confidence: f64,
    ) -> Result<StrategyScan<ComponentDetails>> {
        let mut scan = StrategyScan::new();
        let workloads = scan_workloads(ctx, ctx.home_namespace, &mut scan).await;
        scan.scanned = workloads.len();

        for workload in &workloads {
            if ctx.rules.is_self(&workload.name) {
                continue;
            }
            let labelled = COMPONENT_LABEL_KEYS.iter().any(|key| {
                workload
                    .labels
                    .get(*key)
                    .is_some_and(|value| ctx.rules.component_keywords.matches(value))
            });
            if labelled {
                scan.push(component_from_workload(
                    workload,
                    self.id(),
                    confidence,
                    ctx.observed_at,
                ));
            }
        }

        scan.finish()
    }
}
