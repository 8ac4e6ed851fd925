//! container-image: workloads running a known system image.

use super::{
    DiscoveryStrategy, StrategyContext, StrategyScan, codes, component_from_workload, scan_workloads,
};
use crate::discovery::types::ComponentDetails;
use crate::error::Result;
use async_trait::async_trait;

/// Strategy: a container image matches a configured system image.
pub struct ContainerImageStrategy;

#[async_trait]
impl DiscoveryStrategy<ComponentDetails> for ContainerImageStrategy {
    fn id(&self) -> &'static str {
        codes::CONTAINER_IMAGE
    }

    fn description(&self) -> &'static str {
        "Pod template runs a known system container image"
    }

    fn default_confidence(&self) -> f64 {
        0.85
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
            let runs_system_image = workload
                .images
                .iter()
                .any(|image| ctx.rules.component_images.matches(image));
            if runs_system_image && !ctx.rules.is_self(&workload.name) {
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
