//! Live-cluster accessor backed by `kube`.
//!
//! # Prerequisites
//!
//! - Valid kubeconfig (default context or a named one)
//! - RBAC permission to list namespaces, workloads, services, configmaps and
//!   ingresses
//!
//! Every request is bounded by the configured timeout so a hung API server
//! cannot stall a discovery cycle indefinitely.

use super::{
    ClusterAccessor, ConfigObjectInfo, IngressInfo, Labels, NamespaceInfo, ServiceInfo,
    WorkloadInfo, WorkloadKind,
};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PodTemplateSpec, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    Client, Config,
    api::{Api, ListParams},
};
use std::future::Future;
use std::time::Duration;

/// Kubernetes-backed [`ClusterAccessor`].
#[derive(Clone)]
pub struct KubeClusterAccessor {
    client: Client,
    timeout: Duration,
}

impl KubeClusterAccessor {
    /// Connect using the cluster section of the configuration.
    pub async fn connect(config: &ClusterConfig) -> Result<Self, ClusterError> {
        let client = match config.context.as_deref() {
            Some(context) => Self::client_for_context(context).await?,
            None => Client::try_from(Config::infer().await?)?,
        };
        log::debug!(
            "Connected to Kubernetes API (context: {})",
            config.context.as_deref().unwrap_or("current")
        );
        Ok(Self::from_client(client, config.request_timeout()))
    }

    pub fn from_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn client_for_context(context: &str) -> Result<Client, ClusterError> {
        let kubeconfig = kube::config::Kubeconfig::read()?;
        let config = Config::from_custom_kubeconfig(
            kubeconfig,
            &kube::config::KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await?;
        Ok(Client::try_from(config)?)
    }

    async fn bounded<T, F>(&self, operation: String, request: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClusterError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

fn list_params(selector: Option<&str>) -> ListParams {
    match selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

#[async_trait]
impl ClusterAccessor for KubeClusterAccessor {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .bounded("list namespaces".to_string(), api.list(&ListParams::default()))
            .await?;
        Ok(list.items.into_iter().map(|ns| namespace_info(ns.metadata)).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceInfo>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = self
            .bounded(format!("get namespace {}", name), api.get_opt(name))
            .await?;
        Ok(namespace.map(|ns| namespace_info(ns.metadata)))
    }

    async fn list_workloads(
        &self,
        namespace: &str,
        kind: WorkloadKind,
        selector: Option<&str>,
    ) -> Result<Vec<WorkloadInfo>, ClusterError> {
        let params = list_params(selector);
        let operation = format!("list {}s in {}", kind.as_str().to_lowercase(), namespace);

        let workloads: Vec<WorkloadInfo> = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                self.bounded(operation, api.list(&params))
                    .await?
                    .items
                    .into_iter()
                    .map(|d| {
                        let replicas = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                        let ready = d.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
                        let images = d.spec.as_ref().map(|s| template_images(&s.template));
                        workload_info(kind, d.metadata, replicas, ready, images)
                    })
                    .collect()
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                self.bounded(operation, api.list(&params))
                    .await?
                    .items
                    .into_iter()
                    .map(|s| {
                        let replicas = s.spec.as_ref().and_then(|sp| sp.replicas).unwrap_or(1);
                        let ready = s.status.as_ref().and_then(|st| st.ready_replicas).unwrap_or(0);
                        let images = s.spec.as_ref().map(|sp| template_images(&sp.template));
                        workload_info(kind, s.metadata, replicas, ready, images)
                    })
                    .collect()
            }
            WorkloadKind::DaemonSet => {
                let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
                self.bounded(operation, api.list(&params))
                    .await?
                    .items
                    .into_iter()
                    .map(|ds| {
                        let (replicas, ready) = ds
                            .status
                            .as_ref()
                            .map(|st| (st.desired_number_scheduled, st.number_ready))
                            .unwrap_or((0, 0));
                        let images = ds.spec.as_ref().map(|sp| template_images(&sp.template));
                        workload_info(kind, ds.metadata, replicas, ready, images)
                    })
                    .collect()
            }
        };

        Ok(workloads)
    }

    async fn list_services(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<ServiceInfo>, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded(
                format!("list services in {}", namespace),
                api.list(&list_params(selector)),
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|svc| {
                let selector = svc
                    .spec
                    .as_ref()
                    .and_then(|s| s.selector.clone())
                    .unwrap_or_default();
                let (name, namespace, labels, annotations) = split_meta(svc.metadata);
                ServiceInfo {
                    name,
                    namespace,
                    labels,
                    annotations,
                    selector,
                }
            })
            .collect())
    }

    async fn list_config_objects(
        &self,
        namespace: &str,
    ) -> Result<Vec<ConfigObjectInfo>, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded(
                format!("list configmaps in {}", namespace),
                api.list(&ListParams::default()),
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|cm| {
                let data = cm.data.unwrap_or_default();
                let (name, namespace, labels, annotations) = split_meta(cm.metadata);
                ConfigObjectInfo {
                    name,
                    namespace,
                    labels,
                    annotations,
                    data,
                }
            })
            .collect())
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<IngressInfo>, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded(
                format!("list ingresses in {}", namespace),
                api.list(&ListParams::default()),
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|ing| {
                let hosts = ing
                    .spec
                    .as_ref()
                    .and_then(|s| s.rules.as_ref())
                    .map(|rules| rules.iter().filter_map(|r| r.host.clone()).collect())
                    .unwrap_or_default();
                let (name, namespace, labels, annotations) = split_meta(ing.metadata);
                IngressInfo {
                    name,
                    namespace,
                    labels,
                    annotations,
                    hosts,
                }
            })
            .collect())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn split_meta(metadata: ObjectMeta) -> (String, String, Labels, Labels) {
    (
        metadata.name.unwrap_or_default(),
        metadata.namespace.unwrap_or_default(),
        metadata.labels.unwrap_or_default(),
        metadata.annotations.unwrap_or_default(),
    )
}

fn namespace_info(metadata: ObjectMeta) -> NamespaceInfo {
    let (name, _, labels, annotations) = split_meta(metadata);
    NamespaceInfo {
        name,
        labels,
        annotations,
    }
}

fn workload_info(
    kind: WorkloadKind,
    metadata: ObjectMeta,
    replicas: i32,
    ready_replicas: i32,
    images: Option<Vec<String>>,
) -> WorkloadInfo {
    let (name, namespace, labels, annotations) = split_meta(metadata);
    WorkloadInfo {
        kind,
        name,
        namespace,
        labels,
        annotations,
        replicas,
        ready_replicas,
        images: images.unwrap_or_default(),
    }
}

fn template_images(template: &PodTemplateSpec) -> Vec<String> {
    template
        .spec
        .as_ref()
        .map(|spec| {
            spec.init_containers
                .iter()
                .flatten()
                .chain(spec.containers.iter())
                .filter_map(|c| c.image.clone())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use std::collections::BTreeMap;

    #[test]
    fn test_template_images_includes_init_containers() {
        let template = PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                init_containers: Some(vec![Container {
                    name: "init".to_string(),
                    image: Some("busybox:1.36".to_string()),
                    ..Default::default()
                }]),
                containers: vec![Container {
                    name: "ingester".to_string(),
                    image: Some("grafana/mimir:2.12.0".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };

        assert_eq!(
            template_images(&template),
            vec!["busybox:1.36".to_string(), "grafana/mimir:2.12.0".to_string()]
        );
    }

    #[test]
    fn test_workload_info_from_metadata() {
        let metadata = ObjectMeta {
            name: Some("mimir-ingester-zone-a".to_string()),
            namespace: Some("mimir".to_string()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/component".to_string(),
                "ingester".to_string(),
            )])),
            ..Default::default()
        };

        let info = workload_info(WorkloadKind::StatefulSet, metadata, 3, 2, None);
        assert_eq!(info.name, "mimir-ingester-zone-a");
        assert_eq!(info.namespace, "mimir");
        assert_eq!(info.replicas, 3);
        assert_eq!(info.ready_replicas, 2);
        assert!(info.images.is_empty());
        assert_eq!(
            info.labels.get("app.kubernetes.io/component").map(String::as_str),
            Some("ingester")
        );
    }
}
