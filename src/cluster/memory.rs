//! In-memory [`ClusterAccessor`] with call counting and failure injection.

use super::{
    ClusterAccessor, ConfigObjectInfo, IngressInfo, NamespaceInfo, ServiceInfo, WorkloadInfo,
    WorkloadKind, selector_matches,
};
use crate::error::ClusterError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Accessor operations, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListNamespaces,
    GetNamespace,
    ListWorkloads,
    ListServices,
    ListConfigObjects,
    ListIngresses,
}

impl Operation {
    const ALL: [Operation; 6] = [
        Operation::ListNamespaces,
        Operation::GetNamespace,
        Operation::ListWorkloads,
        Operation::ListServices,
        Operation::ListConfigObjects,
        Operation::ListIngresses,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct Resources {
    namespaces: Vec<NamespaceInfo>,
    workloads: Vec<WorkloadInfo>,
    services: Vec<ServiceInfo>,
    config_objects: Vec<ConfigObjectInfo>,
    ingresses: Vec<IngressInfo>,
}

#[derive(Default)]
struct Failures {
    operations: HashSet<Operation>,
    scoped: HashSet<(Operation, String)>,
    workload_kinds: HashSet<WorkloadKind>,
}

/// A fixed, mutable set of cluster resources.
pub struct InMemoryCluster {
    resources: RwLock<Resources>,
    failures: RwLock<Failures>,
    calls: [AtomicUsize; 6],
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: RwLock<Option<Duration>>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(Resources::default()),
            failures: RwLock::new(Failures::default()),
            calls: Default::default(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            latency: RwLock::new(None),
        }
    }

    pub fn with_namespace(self, namespace: NamespaceInfo) -> Self {
        self.resources.write().namespaces.push(namespace);
        self
    }

    pub fn with_workload(self, workload: WorkloadInfo) -> Self {
        self.resources.write().workloads.push(workload);
        self
    }

    pub fn with_service(self, service: ServiceInfo) -> Self {
        self.resources.write().services.push(service);
        self
    }

    pub fn with_config_object(self, config_object: ConfigObjectInfo) -> Self {
        self.resources.write().config_objects.push(config_object);
        self
    }

    pub fn with_ingress(self, ingress: IngressInfo) -> Self {
        self.resources.write().ingresses.push(ingress);
        self
    }

    /// Delay every call, to widen race windows in concurrency tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = Some(latency);
        self
    }

    pub fn add_workload(&self, workload: WorkloadInfo) {
        self.resources.write().workloads.push(workload);
    }

    pub fn remove_namespace(&self, name: &str) {
        self.resources.write().namespaces.retain(|ns| ns.name != name);
    }

    /// Make every call of `operation` fail.
    pub fn fail(&self, operation: Operation) {
        self.failures.write().operations.insert(operation);
    }

    /// Make `operation` fail only when it targets `namespace`.
    pub fn fail_in_namespace(&self, operation: Operation, namespace: impl Into<String>) {
        self.failures
            .write()
            .scoped
            .insert((operation, namespace.into()));
    }

    /// Make workload listing fail for one workload shape.
    pub fn fail_workload_kind(&self, kind: WorkloadKind) {
        self.failures.write().workload_kinds.insert(kind);
    }

    pub fn heal(&self) {
        *self.failures.write() = Failures::default();
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.calls[operation.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Operation::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Most calls that were ever in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        for counter in &self.calls {
            counter.store(0, Ordering::SeqCst);
        }
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    async fn enter(&self, operation: Operation, scope: &str) -> Result<(), ClusterError> {
        self.calls[operation.index()].fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let failures = self.failures.read();
        if failures.operations.contains(&operation)
            || failures.scoped.contains(&(operation, scope.to_string()))
        {
            return Err(ClusterError::unavailable(
                format!("{:?} {}", operation, scope).trim().to_string(),
                "injected failure",
            ));
        }
        Ok(())
    }
}

fn selected(selector: Option<&str>, labels: &super::Labels) -> Result<bool, ClusterError> {
    match selector {
        Some(selector) => selector_matches(selector, labels),
        None => Ok(true),
    }
}

#[async_trait]
impl ClusterAccessor for InMemoryCluster {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, ClusterError> {
        self.enter(Operation::ListNamespaces, "").await?;
        Ok(self.resources.read().namespaces.clone())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceInfo>, ClusterError> {
        self.enter(Operation::GetNamespace, name).await?;
        Ok(self
            .resources
            .read()
            .namespaces
            .iter()
            .find(|ns| ns.name == name)
            .cloned())
    }

    async fn list_workloads(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        selector: Option<&str>,
    ) -> Result<Vec<WorkloadInfo>, ClusterError> {
        self.enter(Operation::ListWorkloads, namespace).await?;
        if self.failures.read().workload_kinds.contains(&kind) {
            return Err(ClusterError::unavailable(
                format!("list {}s in {}", kind.as_str().to_lowercase(), namespace),
                "injected failure",
            ));
        }

        let resources = self.resources.read();
        let mut out = Vec::new();
        for w in resources
            .workloads
            .iter()
            .filter(|w| w.namespace == namespace && w.kind == kind)
        {
            if selected(selector, &w.labels)? {
                out.push(w.clone());
            }
        }
        Ok(out)
    }

    async fn list_services(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>, ClusterError> {
        self.enter(Operation::ListServices, namespace).await?;
        let resources = self.resources.read();
        let mut out = Vec::new();
        for s in resources.services.iter().filter(|s| s.namespace == namespace) {
            if selected(selector, &s.labels)? {
                out.push(s.clone());
            }
        }
        Ok(out)
    }

    async fn list_config_objects(
        &self,
        namespace: &str,
    ) -> Result<Vec<ConfigObjectInfo>, ClusterError> {
        self.enter(Operation::ListConfigObjects, namespace).await?;
        Ok(self
            .resources
            .read()
            .config_objects
            .iter()
            .filter(|c| c.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<IngressInfo>, ClusterError> {
        self.enter(Operation::ListIngresses, namespace).await?;
        Ok(self
            .resources
            .read()
            .ingresses
            .iter()
            .filter(|i| i.namespace == namespace)
            .cloned()
            .collect())
    }
}
