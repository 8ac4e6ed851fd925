use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Sentinel accepted in `discovery.home_namespace` to request election.
pub const AUTO_NAMESPACE: &str = "auto";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub discovery: DiscoveryConfig,
    pub cache: CacheConfig,
}

/// Cluster connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubeconfig context to use (None = current context)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Deadline applied to every API call
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            context: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClusterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Heuristics used by namespace election and the discovery strategies.
///
/// Pattern strings use three forms: `re:<regex>`, a glob when the string
/// contains `*`, `?` or `[`, and otherwise a case-insensitive substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Home namespace of the monitored system. Empty or "auto" triggers election.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_namespace: Option<String>,
    /// Namespace used when election finds no candidate
    pub fallback_namespace: String,
    /// Namespace name patterns that hint at the home namespace
    pub namespace_patterns: Vec<String>,
    /// Namespace labels (`key=value` or bare `key`) that hint at the home namespace
    pub significant_namespace_labels: Vec<String>,
    /// Keywords identifying system workloads, services and config objects
    pub component_keywords: Vec<String>,
    /// Workload name keywords belonging to this tool, never counted as evidence
    pub self_exclusion: Vec<String>,
    /// Namespaces never considered as tenants or election candidates
    pub excluded_namespaces: Vec<String>,
    /// Namespace label keys whose value is a tenant/org ID
    pub tenant_label_keys: Vec<String>,
    /// Namespace name patterns for tenant namespaces
    pub tenant_namespace_patterns: Vec<String>,
    /// Label/annotation keys on workloads and ingresses carrying an org ID
    pub org_id_keys: Vec<String>,
    /// Config object name patterns holding runtime tenant overrides
    pub runtime_config_patterns: Vec<String>,
    /// Container image fragments of the monitored system
    pub component_images: Vec<String>,
    /// Entities below this confidence are dropped after cross-validation
    pub confidence_threshold: f64,
    /// Per-strategy base confidence overrides keyed by strategy id
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub base_confidence: HashMap<String, f64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            home_namespace: None,
            fallback_namespace: "mimir".to_string(),
            namespace_patterns: strings(&["mimir", "cortex", "*-metrics"]),
            significant_namespace_labels: strings(&[
                "app.kubernetes.io/part-of=mimir",
                "app.kubernetes.io/name=mimir",
                "mimir.grafana.com/home",
            ]),
            component_keywords: strings(&[
                "mimir",
                "cortex",
                "distributor",
                "ingester",
                "querier",
                "query-frontend",
                "query-scheduler",
                "store-gateway",
                "compactor",
                "ruler",
                "alertmanager",
                "overrides-exporter",
            ]),
            self_exclusion: strings(&["mimir-discovery", "mimir-insights"]),
            excluded_namespaces: strings(&["kube-system", "kube-public", "kube-node-lease"]),
            tenant_label_keys: strings(&[
                "mimir.grafana.com/tenant",
                "tenant",
                "org-id",
                "team",
            ]),
            tenant_namespace_patterns: strings(&["tenant-*", "team-*", "*-prod", "*-staging"]),
            org_id_keys: strings(&[
                "x-scope-orgid",
                "mimir.grafana.com/org-id",
                "cortex.io/org-id",
            ]),
            runtime_config_patterns: strings(&["runtime", "overrides"]),
            component_images: strings(&["grafana/mimir", "cortexproject/cortex", "grafana/enterprise-metrics"]),
            confidence_threshold: 0.5,
            base_confidence: HashMap::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the home namespace instead of electing one.
    pub fn with_home_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.home_namespace = Some(namespace.into());
        self
    }

    /// Replace the namespace name patterns used by election.
    pub fn with_namespace_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the significant namespace labels used by election.
    pub fn with_significant_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.significant_namespace_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Override a strategy's base confidence.
    pub fn with_base_confidence(mut self, strategy: impl Into<String>, confidence: f64) -> Self {
        self.base_confidence.insert(strategy.into(), confidence);
        self
    }

    /// Whether the home namespace must be elected.
    pub fn needs_election(&self) -> bool {
        match self.home_namespace.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(ns) => ns.eq_ignore_ascii_case(AUTO_NAMESPACE),
        }
    }
}

/// TTL cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub tenant_ttl_secs: u64,
    pub component_ttl_secs: u64,
    pub refresh_interval_secs: u64,
    pub background_refresh: bool,
    /// Upper bound on one full discovery cycle
    pub cycle_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tenant_ttl_secs: 300,
            component_ttl_secs: 600,
            refresh_interval_secs: 120,
            background_refresh: true,
            cycle_timeout_secs: 90,
        }
    }
}

impl CacheConfig {
    pub fn tenant_ttl(&self) -> Duration {
        Duration::from_secs(self.tenant_ttl_secs)
    }

    pub fn component_ttl(&self) -> Duration {
        Duration::from_secs(self.component_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn with_tenant_ttl(mut self, ttl: Duration) -> Self {
        self.tenant_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_component_ttl(mut self, ttl: Duration) -> Self {
        self.component_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = interval.as_secs();
        self
    }

    /// Reject settings the cache cannot run with. A zero TTL is allowed and
    /// makes every read rediscover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.refresh_interval_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.cycle_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.cycle_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
