//! Wiring shared by every command: configuration, cluster connection,
//! engine and cache.

use crate::cache::DiscoveryCache;
use crate::clock::SystemClock;
use crate::cluster::{ClusterAccessor, KubeClusterAccessor};
use crate::config::{self, Config};
use crate::discovery::{DiscoveryEngine, DiscoveryRules};
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub config_path: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
}

pub struct Session {
    pub config: Config,
    pub engine: Arc<DiscoveryEngine>,
}

impl Session {
    /// Load configuration and connect to the cluster it names.
    pub async fn connect(options: &SessionOptions) -> Result<Self> {
        // Install rustls crypto provider (required for TLS connections to K8s API)
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = load_with_overrides(options)?;
        let accessor = KubeClusterAccessor::connect(&config.cluster).await?;
        Self::with_accessor(config, Arc::new(accessor))
    }

    /// Build a session over an existing accessor.
    pub fn with_accessor(config: Config, accessor: Arc<dyn ClusterAccessor>) -> Result<Self> {
        config.cache.validate()?;
        let rules = DiscoveryRules::from_config(&config.discovery)?;
        let engine = DiscoveryEngine::new(accessor, Arc::new(SystemClock), rules);
        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }

    /// A fresh cache over this session's engine.
    pub fn cache(&self) -> Arc<DiscoveryCache> {
        Arc::new(DiscoveryCache::new(self.engine.clone(), &self.config.cache))
    }
}

/// Resolve configuration files, then apply command-line overrides.
pub fn load_with_overrides(options: &SessionOptions) -> Result<Config> {
    let cwd = std::env::current_dir().ok();
    let mut config = config::load_config(options.config_path.as_deref(), cwd.as_deref())?;

    if let Some(context) = &options.context {
        config.cluster.context = Some(context.clone());
    }
    if let Some(namespace) = &options.namespace {
        config.discovery.home_namespace = Some(namespace.clone());
    }
    Ok(config)
}
