//! Multi-strategy discovery of Mimir tenants and components.
//!
//! Nothing here relies on a static inventory. The engine reads cluster
//! metadata through a [`ClusterAccessor`](crate::cluster::ClusterAccessor)
//! and turns independent, partial evidence into a confidence-scored
//! inventory.
//!
//! # Pipeline
//!
//! 1. **Election** ([`election`]): pick the home namespace when none is
//!    configured.
//! 2. **Strategies** ([`strategies`]): run every registered heuristic scan
//!    concurrently, isolating failures.
//! 3. **Consolidation** ([`consolidation`]): merge findings that share an
//!    identity key (`namespace:name`).
//! 4. **Cross-validation** ([`validation`]): reward corroboration, penalize
//!    entities whose namespace has disappeared, drop what falls under the
//!    confidence threshold.
//!
//! # Example
//!
//! ```rust,ignore
//! use mimir_discovery::discovery::{DiscoveryEngine, DiscoveryRules};
//!
//! let engine = DiscoveryEngine::new(accessor, clock, DiscoveryRules::default());
//! let components = engine.discover_components().await?;
//! for c in &components.entities {
//!     println!("{} {} {:.2}", c.name, c.details.component_type, c.confidence);
//! }
//! ```

pub mod consolidation;
pub mod election;
pub mod engine;
pub mod matcher;
pub mod rules;
pub mod strategies;
pub mod types;
pub mod validation;

pub use consolidation::{consolidate, merge_entity};
pub use election::{
    NamespaceCandidate, elect_namespace, home_from_ranking, rank_namespaces,
    resolve_home_namespace,
};
pub use engine::{Discoverable, DiscoveryEngine};
pub use rules::DiscoveryRules;
pub use strategies::{
    ComponentStrategy, DiscoveryStrategy, StrategyContext, StrategyScan, TenantStrategy,
    component_strategies, execute_all, strategy_confidence, tenant_strategies,
};
pub use types::{
    ComponentDetails, ComponentEntity, ComponentType, ComprehensiveDiscoveryResult,
    DiscoveredEntity, EntityDetails, HomeNamespace, InventoryKind, NamespaceSource,
    StrategyRunResult, TenantDetails, TenantEntity,
};
pub use validation::{ValidationOutcome, cross_validate};
