//! runtime-overrides: tenant IDs listed in the runtime configuration.
//!
//! The monitored system reads per-tenant limits from a YAML document shaped
//! like:
//!
//! ```yaml
//! overrides:
//!   tenant-a:
//!     ingestion_rate: 50000
//!     max_global_series_per_user: 1500000
//! ```
//!
//! Every key under `overrides` is a tenant ID. The entity's namespace is the
//! ID itself, so cross-validation rewards IDs that also name a namespace.

use super::{DiscoveryStrategy, StrategyContext, StrategyScan, codes};
use crate::discovery::types::{TenantDetails, TenantEntity};
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Strategy: tenant IDs declared in runtime override config objects.
pub struct RuntimeOverridesStrategy;

#[derive(Debug, Default, Deserialize)]
struct RuntimeConfig {
    #[serde(default)]
    overrides: Option<BTreeMap<String, TenantLimits>>,
}

/// The limits surfaced on the entity; everything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct TenantLimits {
    ingestion_rate: Option<f64>,
    ingestion_burst_size: Option<u64>,
    max_global_series_per_user: Option<u64>,
    compactor_blocks_retention_period: Option<String>,
}

impl TenantLimits {
    fn annotations(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = self.ingestion_rate {
            out.push(("mimir-discovery/ingestion-rate", v.to_string()));
        }
        if let Some(v) = self.ingestion_burst_size {
            out.push(("mimir-discovery/ingestion-burst-size", v.to_string()));
        }
        if let Some(v) = self.max_global_series_per_user {
            out.push(("mimir-discovery/max-global-series", v.to_string()));
        }
        if let Some(v) = &self.compactor_blocks_retention_period {
            out.push(("mimir-discovery/retention-period", v.clone()));
        }
        out
    }
}

#[async_trait]
impl DiscoveryStrategy<TenantDetails> for RuntimeOverridesStrategy {
    fn id(&self) -> &'static str {
        codes::RUNTIME_OVERRIDES
    }

    fn description(&self) -> &'static str {
        "Tenant IDs listed under `overrides` in the runtime configuration"
    }

    fn default_confidence(&self) -> f64 {
        0.9
    }

    async fn scan(
        &self,
        ctx: &StrategyContext<'_>,
        confidence: f64,
    ) -> Result<StrategyScan<TenantDetails>> {
        let objects = ctx.accessor.list_config_objects(ctx.home_namespace).await?;
        let mut scan = StrategyScan::new();
        let mut tenants: BTreeMap<String, TenantEntity> = BTreeMap::new();

        for object in objects.iter().filter(|o| ctx.rules.is_runtime_config(&o.name)) {
            for (key, text) in &object.data {
                if !(key.ends_with(".yaml") || key.ends_with(".yml")) {
                    continue;
                }
                scan.scanned += 1;

                let parsed: RuntimeConfig = match serde_yaml::from_str(text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        scan.malformed(format!(
                            "config object {}/{} key {}: {}",
                            object.namespace, object.name, key, e
                        ));
                        continue;
                    }
                };

                let Some(overrides) = parsed.overrides.filter(|o| !o.is_empty()) else {
                    continue;
                };
                scan.matched += 1;

                for (tenant_id, limits) in overrides {
                    let source = format!("{}/{}", object.name, key);
                    let entity = tenants.entry(tenant_id.clone()).or_insert_with(|| {
                        TenantEntity::new(
                            &tenant_id,
                            &tenant_id,
                            codes::RUNTIME_OVERRIDES,
                            confidence,
                            ctx.observed_at,
                            TenantDetails::new(&tenant_id),
                        )
                    });
                    entity
                        .annotations
                        .insert("mimir-discovery/overrides-source".to_string(), source);
                    for (k, v) in limits.annotations() {
                        entity.annotations.insert(k.to_string(), v);
                    }
                }
            }
        }

        scan.entities = tenants.into_values().collect();
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ConfigObjectInfo, InMemoryCluster};
    use crate::discovery::rules::DiscoveryRules;
    use chrono::{DateTime, Utc};

    const RUNTIME: &str = r#"
overrides:
  team-a:
    ingestion_rate: 50000
  "12345":
    max_global_series_per_user: 1500000
"#;

    #[tokio::test]
    async fn test_overrides_keys_become_tenants() {
        let cluster = InMemoryCluster::new()
            .with_config_object(
                ConfigObjectInfo::new("mimir", "mimir-runtime").with_data("runtime.yaml", RUNTIME),
            )
            .with_config_object(
                ConfigObjectInfo::new("mimir", "mimir-config").with_data("mimir.yaml", "target: all"),
            );
        let rules = DiscoveryRules::default();
        let ctx = StrategyContext {
            accessor: &cluster,
            rules: &rules,
            home_namespace: "mimir",
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        };

        let scan = RuntimeOverridesStrategy.scan(&ctx, 0.9).await.unwrap();
        assert_eq!(scan.scanned, 1);
        assert_eq!(scan.matched, 1);
        let ids: Vec<&str> = scan.entities.iter().map(|e| e.details.org_id.as_str()).collect();
        assert_eq!(ids, vec!["12345", "team-a"]);
        assert_eq!(
            scan.entities[1]
                .annotations
                .get("mimir-discovery/ingestion-rate")
                .map(String::as_str),
            Some("50000")
        );
    }

    #[tokio::test]
    async fn test_malformed_yaml_is_non_fatal() {
        let cluster = InMemoryCluster::new()
            .with_config_object(
                ConfigObjectInfo::new("mimir", "runtime-a").with_data("runtime.yaml", "overrides: [unclosed"),
            )
            .with_config_object(
                ConfigObjectInfo::new("mimir", "runtime-b").with_data("runtime.yaml", RUNTIME),
            );
        let rules = DiscoveryRules::default();
        let ctx = StrategyContext {
            accessor: &cluster,
            rules: &rules,
            home_namespace: "mimir",
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        };

        let scan = RuntimeOverridesStrategy.scan(&ctx, 0.9).await.unwrap();
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.entities.len(), 2);
        assert_eq!(scan.scanned, 2);
    }
}
