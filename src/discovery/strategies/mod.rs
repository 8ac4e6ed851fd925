//! Discovery strategies.
//!
//! Each strategy is one independent heuristic scan over a category of cluster
//! evidence, implemented as a separate module with a consistent interface.
//! Strategies share no state; [`execute_all`] runs every registered strategy
//! concurrently and isolates their failures from each other.

mod container_image;
mod ingress_org_header;
mod namespace_label;
mod namespace_name_pattern;
mod remote_write_traffic;
mod runtime_overrides;
mod service_match;
mod workload_label;
mod workload_name_pattern;
mod workload_org_annotation;

use crate::cluster::{ClusterAccessor, NamespaceInfo, WorkloadInfo, WorkloadKind, list_all_workloads};
use crate::discovery::matcher::extract_topology;
use crate::discovery::rules::DiscoveryRules;
use crate::discovery::types::{
    ComponentDetails, ComponentEntity, ComponentType, DiscoveredEntity, EntityDetails,
    StrategyRunResult, TenantDetails,
};
use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Instant;

// ============================================================================
// Strategy Trait
// ============================================================================

/// Everything a strategy may read during one discovery cycle.
pub struct StrategyContext<'a> {
    pub accessor: &'a dyn ClusterAccessor,
    pub rules: &'a DiscoveryRules,
    pub home_namespace: &'a str,
    /// Timestamp stamped on every entity of this cycle
    pub observed_at: DateTime<Utc>,
}

/// Raw output of [`DiscoveryStrategy::scan`].
#[derive(Debug)]
pub struct StrategyScan<D> {
    pub entities: Vec<DiscoveredEntity<D>>,
    pub scanned: usize,
    pub matched: usize,
    /// Non-fatal problems
    pub errors: Vec<String>,
    reads_ok: usize,
    first_failure: Option<ClusterError>,
}

impl<D> StrategyScan<D> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            scanned: 0,
            matched: 0,
            errors: Vec::new(),
            reads_ok: 0,
            first_failure: None,
        }
    }

    pub fn push(&mut self, entity: DiscoveredEntity<D>) {
        self.matched += 1;
        self.entities.push(entity);
    }

    /// Record a successful cluster read.
    pub fn read_ok(&mut self) {
        self.reads_ok += 1;
    }

    /// Record a failed cluster read. The scan continues.
    pub fn read_failed(&mut self, context: impl Display, error: ClusterError) {
        self.errors.push(format!("{}: {}", context, error));
        if self.first_failure.is_none() {
            self.first_failure = Some(error);
        }
    }

    /// Record a malformed resource.
    pub fn malformed(&mut self, message: String) {
        self.errors.push(message);
    }

    /// Fail the scan when every cluster read it attempted failed.
    pub fn finish(self) -> Result<Self> {
        match self.first_failure {
            Some(error) if self.reads_ok == 0 => Err(error.into()),
            _ => Ok(self),
        }
    }
}

impl<D> Default for StrategyScan<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for discovery strategies producing entities with details `D`.
#[async_trait]
pub trait DiscoveryStrategy<D: EntityDetails>: Send + Sync {
    /// Stable strategy identifier (e.g., "namespace-label").
    fn id(&self) -> &'static str;

    /// One line shown next to the id in strategy breakdowns.
    fn description(&self) -> &'static str;

    /// A-priori trust in this category of evidence.
    fn default_confidence(&self) -> f64;

    /// Registered but not implemented; reports nothing instead of failing.
    fn is_placeholder(&self) -> bool {
        false
    }

    /// Scan the cluster. Every entity carries `confidence`.
    async fn scan(&self, ctx: &StrategyContext<'_>, confidence: f64) -> Result<StrategyScan<D>>;
}

// ============================================================================
// Strategy Codes
// ============================================================================

/// Strategy identifiers.
pub mod codes {
    pub const NAMESPACE_LABEL: &str = "namespace-label";
    pub const NAMESPACE_NAME_PATTERN: &str = "namespace-name-pattern";
    pub const WORKLOAD_ORG_ANNOTATION: &str = "workload-org-annotation";
    pub const RUNTIME_OVERRIDES: &str = "runtime-overrides";
    pub const INGRESS_ORG_HEADER: &str = "ingress-org-header";
    pub const REMOTE_WRITE_TRAFFIC: &str = "remote-write-traffic";

    pub const WORKLOAD_NAME_PATTERN: &str = "workload-name-pattern";
    pub const WORKLOAD_LABEL: &str = "workload-label";
    pub const CONTAINER_IMAGE: &str = "container-image";
    pub const SERVICE_MATCH: &str = "service-match";
}

// ============================================================================
// Strategy Registry
// ============================================================================

pub type TenantStrategy = Box<dyn DiscoveryStrategy<TenantDetails>>;
pub type ComponentStrategy = Box<dyn DiscoveryStrategy<ComponentDetails>>;

/// All tenant strategies.
pub fn tenant_strategies() -> Vec<TenantStrategy> {
    vec![
        Box::new(namespace_label::NamespaceLabelStrategy),
        Box::new(namespace_name_pattern::NamespaceNamePatternStrategy),
        Box::new(workload_org_annotation::WorkloadOrgAnnotationStrategy),
        Box::new(runtime_overrides::RuntimeOverridesStrategy),
        Box::new(ingress_org_header::IngressOrgHeaderStrategy),
        Box::new(remote_write_traffic::RemoteWriteTrafficStrategy),
    ]
}

/// All component strategies.
pub fn component_strategies() -> Vec<ComponentStrategy> {
    vec![
        Box::new(workload_name_pattern::WorkloadNamePatternStrategy),
        Box::new(workload_label::WorkloadLabelStrategy),
        Box::new(container_image::ContainerImageStrategy),
        Box::new(service_match::ServiceMatchStrategy),
    ]
}

// ============================================================================
// Execution
// ============================================================================

/// Run confidence: `base × matched / scanned`, or `base` when nothing was scanned.
pub fn strategy_confidence(base: f64, matched: usize, scanned: usize) -> f64 {
    if scanned == 0 {
        base
    } else {
        base * (matched as f64 / scanned as f64)
    }
}

async fn execute_one<D: EntityDetails>(
    strategy: &dyn DiscoveryStrategy<D>,
    ctx: &StrategyContext<'_>,
) -> StrategyRunResult<D> {
    let id = strategy.id();
    let base = ctx.rules.base_confidence(id, strategy.default_confidence());
    let started = Instant::now();

    let mut result = StrategyRunResult {
        strategy_id: id.to_string(),
        description: strategy.description().to_string(),
        entities: Vec::new(),
        confidence: base,
        errors: Vec::new(),
        scanned: 0,
        matched: 0,
        failed: false,
        placeholder: strategy.is_placeholder(),
        duration: std::time::Duration::ZERO,
        timestamp: ctx.observed_at,
    };

    if result.placeholder {
        log::debug!("Strategy {} is not implemented, reporting no entities", id);
        return result;
    }

    match strategy.scan(ctx, base).await {
        Ok(scan) => {
            result.confidence = strategy_confidence(base, scan.matched, scan.scanned);
            result.scanned = scan.scanned;
            result.matched = scan.matched;
            result.errors = scan.errors;
            result.entities = scan.entities;
            log::debug!(
                "Strategy {} matched {}/{} (confidence {:.2})",
                id,
                result.matched,
                result.scanned,
                result.confidence
            );
        }
        Err(e) => {
            log::warn!("Strategy {} failed: {}", id, e);
            result.confidence = 0.0;
            result.failed = true;
            result.errors.push(e.to_string());
        }
    }

    result.duration = started.elapsed();
    result
}

/// Run every strategy concurrently.
///
/// Returns the results keyed by strategy id plus one `"<id>: <error>"` entry
/// per strategy that failed outright.
pub async fn execute_all<D: EntityDetails>(
    strategies: &[Box<dyn DiscoveryStrategy<D>>],
    ctx: &StrategyContext<'_>,
) -> (BTreeMap<String, StrategyRunResult<D>>, Vec<String>) {
    let runs = join_all(strategies.iter().map(|s| execute_one(s.as_ref(), ctx))).await;

    let mut errors = Vec::new();
    let mut results = BTreeMap::new();
    for run in runs {
        if run.failed {
            errors.extend(run.errors.iter().map(|e| format!("{}: {}", run.strategy_id, e)));
        }
        results.insert(run.strategy_id.clone(), run);
    }
    (results, errors)
}

// ============================================================================
// Shared scan helpers
// ============================================================================

/// Namespaces that may host tenants: everything except excluded namespaces,
/// the home namespace and this tool's own namespaces.
pub(crate) async fn tenant_candidates(ctx: &StrategyContext<'_>) -> Result<Vec<NamespaceInfo>> {
    let namespaces = ctx.accessor.list_namespaces().await?;
    Ok(namespaces
        .into_iter()
        .filter(|ns| {
            ns.name != ctx.home_namespace
                && !ctx.rules.is_excluded_namespace(&ns.name)
                && !ctx.rules.is_self(&ns.name)
        })
        .collect())
}

/// List every workload shape in `namespace`, recording reads on `scan`.
pub(crate) async fn scan_workloads<D>(
    ctx: &StrategyContext<'_>,
    namespace: &str,
    scan: &mut StrategyScan<D>,
) -> Vec<WorkloadInfo> {
    let (workloads, errors) = list_all_workloads(ctx.accessor, namespace, None).await;
    if errors.len() < WorkloadKind::ALL.len() {
        scan.read_ok();
    }
    for error in errors {
        scan.read_failed(format!("workloads in {}", namespace), error);
    }
    workloads
}

/// Label keys whose values name a component.
pub(crate) const COMPONENT_LABEL_KEYS: &[&str] = &[
    "app.kubernetes.io/component",
    "app.kubernetes.io/name",
    "app.kubernetes.io/part-of",
];

/// Build a component entity from a workload.
pub(crate) fn component_from_workload(
    workload: &WorkloadInfo,
    strategy: &str,
    confidence: f64,
    observed_at: DateTime<Utc>,
) -> ComponentEntity {
    let mut component_type = ComponentType::classify(&workload.name);
    if component_type == ComponentType::Unknown
        && let Some(label) = workload.labels.get(COMPONENT_LABEL_KEYS[0])
    {
        component_type = ComponentType::classify(label);
    }

    let (zone, availability_zone, region) = extract_topology(&workload.name, &workload.labels);
    let details = ComponentDetails {
        component_type,
        workload_kind: Some(workload.kind),
        replicas: Some(workload.replicas),
        ready_replicas: Some(workload.ready_replicas),
        images: workload.images.clone(),
        zone,
        availability_zone,
        region,
    };

    ComponentEntity::new(
        &workload.namespace,
        &workload.name,
        strategy,
        confidence,
        observed_at,
        details,
    )
    .with_labels(&workload.labels)
    .with_annotations(&workload.annotations)
}
