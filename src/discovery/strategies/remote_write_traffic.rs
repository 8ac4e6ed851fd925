//! remote-write-traffic: tenants seen in ingestion traffic.
//!
//! Identifying tenants from traffic needs per-tenant metric values, which
//! this crate does not read. The strategy stays registered so results list
//! it, and it reports no entities.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes};
use crate::discovery::types::TenantDetails;
use crate::error::Result;
use async_trait::async_trait;

pub struct RemoteWriteTrafficStrategy;

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for RemoteWriteTrafficStrategy {
    fn id(&self) -> &'static str {
        codes::REMOTE_WRITE_TRAFFIC
    }

    fn description(&self) -> &'static str {
        "Tenants observed in remote-write traffic (not implemented)"
    }

    fn default_confidence(&self) -> f64 {
        0.5
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    async fn scan(
        &self,
        _ctx: &StrategyContext<'_>,
        _confidence: f64,
    ) -> Result<StrategyScan<TenantDetails>> {
        Ok(StrategyScan::new())
    }
}
