//! workload-name-pattern: workloads named after system components.

use super::{
    DiscoveryStrategy, StrategyContext, StrategyScan, codes, component_from_workload, scan_workloads,
};
use crate::discovery::types::ComponentDetails;
use crate::error::Result;
use async_trait::async_trait;

/// Strategy: workload name contains a component keyword.
pub struct WorkloadNamePatternStrategy;

#[async_trait]
impl DiscoveryStrategy<ComponentDetails> for WorkloadNamePatternStrategy {
    fn id(&self) -> &'static str {
        codes::WORKLOAD_NAME_PATTERN
    }

    fn description(&self) -> &'static str {
        "Deployment, StatefulSet or DaemonSet name contains a component keyword"
    }

    fn default_confidence(&self) -> f64 {
        0.9
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
            if ctx.rules.is_self(&workload.name)
                || !ctx.rules.component_keywords.matches(&workload.name)
            {
                continue;
            }
            scan.push(component_from_workload(
                workload,
                self.id(),
                confidence,
                ctx.observed_at,
            ));
        }

        scan.finish()
    }
}
