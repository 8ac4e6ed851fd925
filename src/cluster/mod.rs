//! Read-only access to cluster resource metadata.
//!
//! Discovery never talks to the Kubernetes API directly; it goes through
//! [`ClusterAccessor`], which hands back plain metadata records. Two
//! implementations ship with the crate:
//!
//! - [`KubeClusterAccessor`] talks to a live cluster through kubeconfig.
//! - [`InMemoryCluster`] serves a fixed resource set, counts calls and can
//!   inject failures. Tests and dry runs use it.

pub mod kube_accessor;
pub mod memory;

use crate::error::ClusterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use kube_accessor::KubeClusterAccessor;
pub use memory::{InMemoryCluster, Operation};

/// Upper bound on per-namespace requests one scan keeps in flight.
pub const MAX_CONCURRENT_REQUESTS: usize = 8;

/// Label or annotation map.
pub type Labels = BTreeMap<String, String>;

// ============================================================================
// Resource metadata
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub labels: Labels,
    pub annotations: Labels,
}

impl NamespaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// The three workload shapes that can host system components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 3] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::DaemonSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub annotations: Labels,
    /// Desired replicas (desired scheduled pods for a DaemonSet)
    pub replicas: i32,
    pub ready_replicas: i32,
    /// Container images from the pod template
    pub images: Vec<String>,
}

impl WorkloadInfo {
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            replicas: 1,
            ready_replicas: 1,
            images: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.images.push(image.into());
        self
    }

    pub fn with_replicas(mut self, replicas: i32, ready: i32) -> Self {
        self.replicas = replicas;
        self.ready_replicas = ready;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub annotations: Labels,
    pub selector: Labels,
}

impl ServiceInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            selector: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A config object (ConfigMap) with its textual payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObjectInfo {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub annotations: Labels,
    pub data: BTreeMap<String, String>,
}

impl ConfigObjectInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// An ingress-like routing object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressInfo {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    pub annotations: Labels,
    pub hosts: Vec<String>,
}

impl IngressInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            hosts: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }
}

// ============================================================================
// Accessor trait
// ============================================================================

/// Read-only view of cluster resources.
///
/// Implementations may be slow and may fail; callers treat every method as
/// fallible I/O. `selector` is an equality-based label selector such as
/// `app.kubernetes.io/name=mimir,tier`.
#[async_trait]
pub trait ClusterAccessor: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, ClusterError>;

    /// Fetch one namespace; `Ok(None)` when it does not exist.
    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceInfo>, ClusterError>;

    async fn list_workloads(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        selector: Option<&str>,
    ) -> Result<Vec<WorkloadInfo>, ClusterError>;

    async fn list_services(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>, ClusterError>;

    async fn list_config_objects(
        &self,
        namespace: &str,
    ) -> Result<Vec<ConfigObjectInfo>, ClusterError>;

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<IngressInfo>, ClusterError>;
}

/// List every workload shape in a namespace.
///
/// A failing shape does not hide the others; its error is returned alongside
/// whatever the remaining shapes produced.
pub async fn list_all_workloads(
    accessor: &dyn ClusterAccessor,
    namespace: &str,
    selector: Option<&str>,
) -> (Vec<WorkloadInfo>, Vec<ClusterError>) {
    let mut workloads = Vec::new();
    let mut errors = Vec::new();

    for kind in WorkloadKind::ALL {
        match accessor.list_workloads(namespace, kind, selector).await {
            Ok(mut items) => workloads.append(&mut items),
            Err(e) => errors.push(e),
        }
    }

    (workloads, errors)
}

/// Check `labels` against an equality-based selector.
pub fn selector_matches(selector: &str, labels: &Labels) -> Result<bool, ClusterError> {
    for requirement in selector.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if requirement.starts_with('=') || requirement.starts_with("!=") {
            return Err(ClusterError::InvalidSelector(selector.to_string()));
        }

        let satisfied = if let Some((key, value)) = requirement.split_once("!=") {
            labels.get(key.trim()).map(String::as_str) != Some(value.trim())
        } else if let Some((key, value)) = requirement.split_once('=') {
            let value = value.strip_prefix('=').unwrap_or(value);
            labels.get(key.trim()).map(String::as_str) == Some(value.trim())
        } else if let Some(key) = requirement.strip_prefix('!') {
            !labels.contains_key(key.trim())
        } else {
            labels.contains_key(requirement)
        };

        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}
