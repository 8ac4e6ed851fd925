//! Core data types for discovery results.

use crate::cluster::{Labels, WorkloadKind};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Inventory kinds
// ============================================================================

/// The two independently cached inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    Tenant,
    Component,
}

impl InventoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryKind::Tenant => "tenant",
            InventoryKind::Component => "component",
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload carried by a [`DiscoveredEntity`].
pub trait EntityDetails: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    const KIND: InventoryKind;

    /// Fold another observation of the same entity into this one.
    fn merge_from(&mut self, incoming: &Self);
}

// ============================================================================
// Tenants
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantDetails {
    /// Best-effort tenant identifier; empty when unknown.
    pub org_id: String,
}

impl TenantDetails {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
        }
    }
}

impl EntityDetails for TenantDetails {
    const KIND: InventoryKind = InventoryKind::Tenant;

    fn merge_from(&mut self, incoming: &Self) {
        // First non-empty org ID sticks.
        if self.org_id.is_empty() && !incoming.org_id.is_empty() {
            self.org_id = incoming.org_id.clone();
        }
    }
}

// ============================================================================
// Components
// ============================================================================

/// Component role, classified from resource names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Distributor,
    Ingester,
    Querier,
    QueryFrontend,
    QueryScheduler,
    StoreGateway,
    Compactor,
    Ruler,
    Alertmanager,
    OverridesExporter,
    Gateway,
    #[default]
    Unknown,
}

impl ComponentType {
    /// Name fragments in match order; longer, more specific fragments first.
    const FRAGMENTS: &'static [(&'static str, ComponentType)] = &[
        ("overrides-exporter", ComponentType::OverridesExporter),
        ("query-frontend", ComponentType::QueryFrontend),
        ("query-scheduler", ComponentType::QueryScheduler),
        ("store-gateway", ComponentType::StoreGateway),
        ("alertmanager", ComponentType::Alertmanager),
        ("distributor", ComponentType::Distributor),
        ("compactor", ComponentType::Compactor),
        ("ingester", ComponentType::Ingester),
        ("querier", ComponentType::Querier),
        ("ruler", ComponentType::Ruler),
        ("gateway", ComponentType::Gateway),
        ("nginx", ComponentType::Gateway),
    ];

    /// Classify a resource name. Not authoritative.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        Self::FRAGMENTS
            .iter()
            .find(|(fragment, _)| lower.contains(fragment))
            .map(|(_, ty)| *ty)
            .unwrap_or(ComponentType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Distributor => "distributor",
            ComponentType::Ingester => "ingester",
            ComponentType::Querier => "querier",
            ComponentType::QueryFrontend => "query-frontend",
            ComponentType::QueryScheduler => "query-scheduler",
            ComponentType::StoreGateway => "store-gateway",
            ComponentType::Compactor => "compactor",
            ComponentType::Ruler => "ruler",
            ComponentType::Alertmanager => "alertmanager",
            ComponentType::OverridesExporter => "overrides-exporter",
            ComponentType::Gateway => "gateway",
            ComponentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentDetails {
    pub component_type: ComponentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_kind: Option<WorkloadKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
}

impl ComponentDetails {
    pub fn of_type(component_type: ComponentType) -> Self {
        Self {
            component_type,
            ..Default::default()
        }
    }
}

impl EntityDetails for ComponentDetails {
    const KIND: InventoryKind = InventoryKind::Component;

    fn merge_from(&mut self, incoming: &Self) {
        if self.component_type == ComponentType::Unknown {
            self.component_type = incoming.component_type;
        }
        if self.workload_kind.is_none() {
            self.workload_kind = incoming.workload_kind;
        }
        if incoming.replicas.is_some() {
            self.replicas = incoming.replicas;
            self.ready_replicas = incoming.ready_replicas;
        }
        for image in &incoming.images {
            if !self.images.contains(image) {
                self.images.push(image.clone());
            }
        }
        // Later-observed topology wins.
        if !incoming.zone.is_empty() {
            self.zone = incoming.zone.clone();
        }
        if !incoming.availability_zone.is_empty() {
            self.availability_zone = incoming.availability_zone.clone();
        }
        if !incoming.region.is_empty() {
            self.region = incoming.region.clone();
        }
    }
}

// ============================================================================
// Discovered entity
// ============================================================================

/// A tenant or component found by one or more strategies.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredEntity<D> {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub annotations: Labels,
    /// Heuristic trust score in [0, 1]
    pub confidence: f64,
    /// Strategies that contributed evidence, duplicates allowed
    pub discovery_methods: Vec<String>,
    pub last_seen: DateTime<Utc>,
    /// Strategy that produced the first instance before consolidation
    pub source_strategy: String,
    #[serde(flatten)]
    pub details: D,
}

pub type TenantEntity = DiscoveredEntity<TenantDetails>;
pub type ComponentEntity = DiscoveredEntity<ComponentDetails>;

impl<D: EntityDetails> DiscoveredEntity<D> {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        strategy: &str,
        confidence: f64,
        seen_at: DateTime<Utc>,
        details: D,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            confidence,
            discovery_methods: vec![strategy.to_string()],
            last_seen: seen_at,
            source_strategy: strategy.to_string(),
            details,
        }
    }

    pub fn with_labels(mut self, labels: &Labels) -> Self {
        self.labels.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_annotations(mut self, annotations: &Labels) -> Self {
        self.annotations
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Deduplication key shared by every strategy observing the same resource.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    /// Whether more than one strategy contributed evidence.
    pub fn is_corroborated(&self) -> bool {
        self.discovery_methods.len() > 1
    }
}

// ============================================================================
// Strategy and cycle results
// ============================================================================

/// Output of one strategy run, before consolidation.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRunResult<D> {
    pub strategy_id: String,
    pub description: String,
    pub entities: Vec<DiscoveredEntity<D>>,
    /// Confidence in the run as a whole, not per entity
    pub confidence: f64,
    /// Non-fatal problems and, when `failed`, the fatal one
    pub errors: Vec<String>,
    pub scanned: usize,
    pub matched: usize,
    /// The strategy could not complete
    pub failed: bool,
    /// The strategy is registered but not implemented
    pub placeholder: bool,
    #[serde(serialize_with = "serialize_millis", rename = "duration_ms")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

/// How the home namespace of the monitored system was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum NamespaceSource {
    Configured,
    Elected { score: f64 },
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeNamespace {
    pub name: String,
    #[serde(flatten)]
    pub source: NamespaceSource,
}

/// The unit cached and served. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveDiscoveryResult<D> {
    pub kind: InventoryKind,
    pub home_namespace: HomeNamespace,
    pub strategies: BTreeMap<String, StrategyRunResult<D>>,
    pub entities: Vec<DiscoveredEntity<D>>,
    pub total_strategies: usize,
    pub successful_strategies: usize,
    /// Entities removed by the confidence cutoff
    pub dropped_entities: usize,
    pub errors: Vec<String>,
    #[serde(serialize_with = "serialize_millis", rename = "duration_ms")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl<D: EntityDetails> ComprehensiveDiscoveryResult<D> {
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn find(&self, namespace: &str, name: &str) -> Option<&DiscoveredEntity<D>> {
        self.entities
            .iter()
            .find(|e| e.namespace == namespace && e.name == name)
    }
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
}
