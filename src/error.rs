//! Error types for discovery, cluster access, and configuration.

use std::time::Duration;
use thiserror::Error;

/// Crate-level error.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cluster access failed: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No namespace scored above zero during election")]
    NoNamespaceCandidate,

    #[error("All {attempted} {inventory} strategies failed: {}", errors.join("; "))]
    AllStrategiesFailed {
        inventory: &'static str,
        attempted: usize,
        errors: Vec<String>,
    },

    #[error("{inventory} discovery timed out after {timeout:?}")]
    Timeout {
        inventory: &'static str,
        timeout: Duration,
    },

    #[error("Refresh failed: {}", failures.join("; "))]
    Refresh { failures: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a cluster resource accessor.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to infer Kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Request for {operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Invalid label selector '{0}'")]
    InvalidSelector(String),

    #[error("{operation} failed: {message}")]
    Unavailable { operation: String, message: String },
}

impl ClusterError {
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading or compiling configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid label requirement '{0}', expected key=value or key")]
    InvalidLabel(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_strategies_failed_lists_every_error() {
        let err = DiscoveryError::AllStrategiesFailed {
            inventory: "tenant",
            attempted: 2,
            errors: vec!["a: boom".to_string(), "b: bang".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("All 2 tenant strategies failed"));
        assert!(msg.contains("a: boom; b: bang"));
    }

    #[test]
    fn test_cluster_error_converts() {
        let err: DiscoveryError = ClusterError::unavailable("list namespaces", "refused").into();
        assert!(matches!(err, DiscoveryError::Cluster(_)));
        assert_eq!(
            err.to_string(),
            "Cluster access failed: list namespaces failed: refused"
        );
    }
}
