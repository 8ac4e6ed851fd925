//! # Mimir Discovery
//!
//! Finds the components and tenants of a Mimir-like metrics system in a live
//! Kubernetes cluster without a static inventory.
//!
//! ## Features
//!
//! - **Namespace election**: scores namespaces on name, labels and contents
//!   to find where the system lives
//! - **Independent strategies**: several heuristics per inventory, each
//!   allowed to fail on its own
//! - **Consolidation**: findings that name the same entity are merged and
//!   corroboration raises confidence
//! - **TTL cache**: per-inventory snapshots with single-flight refresh and
//!   an optional background refresh loop
//!
//! ## Example
//!
//! ```rust,no_run
//! use mimir_discovery::{
//!     CacheConfig, DiscoveryCache, DiscoveryEngine, DiscoveryRules, InMemoryCluster,
//!     NamespaceInfo, SystemClock,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> mimir_discovery::Result<()> {
//! let cluster = Arc::new(InMemoryCluster::new().with_namespace(NamespaceInfo::new("mimir")));
//! let engine = DiscoveryEngine::new(cluster, Arc::new(SystemClock), DiscoveryRules::default());
//! let cache = DiscoveryCache::new(Arc::new(engine), &CacheConfig::default());
//!
//! let components = cache.get_component_inventory().await?;
//! println!("{} components", components.entity_count());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;

// Re-export commonly used types and functions
pub use cache::{CacheStatus, DiscoveryCache, RefreshTarget};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cluster::{ClusterAccessor, InMemoryCluster, KubeClusterAccessor, NamespaceInfo};
pub use config::{CacheConfig, Config, DiscoveryConfig, load_config};
pub use discovery::{
    ComponentEntity, ComprehensiveDiscoveryResult, DiscoveryEngine, DiscoveryRules, TenantEntity,
};
pub use error::{DiscoveryError, Result};
