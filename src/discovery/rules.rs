//! Compiled discovery heuristics.
//!
//! [`DiscoveryRules`] is built once from [`DiscoveryConfig`] and shared
//! read-only by election, every strategy and cross-validation.

use super::matcher::{KeywordSet, LabelRequirement, Pattern};
use crate::cluster::Labels;
use crate::config::DiscoveryConfig;
use crate::error::ConfigError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    home_namespace: Option<String>,
    fallback_namespace: String,
    pub namespace_patterns: Vec<Pattern>,
    pub significant_labels: Vec<LabelRequirement>,
    pub component_keywords: KeywordSet,
    self_exclusion: KeywordSet,
    excluded_namespaces: Vec<String>,
    pub tenant_label_keys: Vec<String>,
    pub tenant_namespace_patterns: Vec<Pattern>,
    pub org_id_keys: Vec<String>,
    pub runtime_config_patterns: Vec<Pattern>,
    pub component_images: KeywordSet,
    confidence_threshold: f64,
    base_confidence: HashMap<String, f64>,
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} is outside [0, 1]", value),
        })
    }
}

impl DiscoveryRules {
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, ConfigError> {
        check_unit("discovery.confidence_threshold", config.confidence_threshold)?;
        for (strategy, value) in &config.base_confidence {
            check_unit("discovery.base_confidence", *value).map_err(|_| {
                ConfigError::InvalidValue {
                    field: "discovery.base_confidence",
                    reason: format!("{} for '{}' is outside [0, 1]", value, strategy),
                }
            })?;
        }

        let fallback_namespace = config.fallback_namespace.trim().to_string();
        if fallback_namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "discovery.fallback_namespace",
                reason: "must not be empty".to_string(),
            });
        }

        let home_namespace = if config.needs_election() {
            None
        } else {
            config.home_namespace.as_deref().map(|ns| ns.trim().to_string())
        };

        let significant_labels = config
            .significant_namespace_labels
            .iter()
            .map(|raw| LabelRequirement::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            home_namespace,
            fallback_namespace,
            namespace_patterns: Pattern::parse_all(&config.namespace_patterns)?,
            significant_labels,
            component_keywords: KeywordSet::new(&config.component_keywords),
            self_exclusion: KeywordSet::new(&config.self_exclusion),
            excluded_namespaces: config
                .excluded_namespaces
                .iter()
                .map(|ns| ns.trim().to_lowercase())
                .collect(),
            tenant_label_keys: config.tenant_label_keys.clone(),
            tenant_namespace_patterns: Pattern::parse_all(&config.tenant_namespace_patterns)?,
            org_id_keys: config.org_id_keys.clone(),
            runtime_config_patterns: Pattern::parse_all(&config.runtime_config_patterns)?,
            component_images: KeywordSet::new(&config.component_images),
            confidence_threshold: config.confidence_threshold,
            base_confidence: config.base_confidence.clone(),
        })
    }

    /// Configured home namespace, `None` when it must be elected.
    pub fn home_namespace(&self) -> Option<&str> {
        self.home_namespace.as_deref()
    }

    pub fn needs_election(&self) -> bool {
        self.home_namespace.is_none()
    }

    pub fn fallback_namespace(&self) -> &str {
        &self.fallback_namespace
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Base confidence for a strategy, honouring configured overrides.
    pub fn base_confidence(&self, strategy_id: &str, default: f64) -> f64 {
        self.base_confidence
            .get(strategy_id)
            .copied()
            .unwrap_or(default)
    }

    /// Resource names belonging to this tool.
    pub fn is_self(&self, name: &str) -> bool {
        self.self_exclusion.matches(name)
    }

    pub fn is_excluded_namespace(&self, namespace: &str) -> bool {
        let lower = namespace.to_lowercase();
        self.excluded_namespaces.iter().any(|ns| *ns == lower)
    }

    /// Whether a resource looks like part of the monitored system.
    pub fn is_system_evidence(&self, name: &str, labels: &Labels, annotations: &Labels) -> bool {
        !self.is_self(name)
            && self
                .component_keywords
                .matches_metadata(name, labels, annotations)
    }

    /// First namespace name pattern matching `name`.
    pub fn matching_namespace_pattern(&self, name: &str) -> Option<&Pattern> {
        self.namespace_patterns.iter().find(|p| p.matches(name))
    }

    pub fn matching_tenant_pattern(&self, name: &str) -> Option<&Pattern> {
        self.tenant_namespace_patterns.iter().find(|p| p.matches(name))
    }

    pub fn is_runtime_config(&self, name: &str) -> bool {
        self.runtime_config_patterns.iter().any(|p| p.matches(name))
    }
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        // Built-in defaults always compile; fall back to an empty rule set otherwise.
        Self::from_config(&DiscoveryConfig::default()).unwrap_or_else(|e| {
            log::error!("Built-in discovery defaults failed to compile: {}", e);
            Self {
                home_namespace: None,
                fallback_namespace: "mimir".to_string(),
                namespace_patterns: Vec::new(),
                significant_labels: Vec::new(),
                component_keywords: KeywordSet::default(),
                self_exclusion: KeywordSet::default(),
                excluded_namespaces: Vec::new(),
                tenant_label_keys: Vec::new(),
                tenant_namespace_patterns: Vec::new(),
                org_id_keys: Vec::new(),
                runtime_config_patterns: Vec::new(),
                component_images: KeywordSet::default(),
                confidence_threshold: 0.5,
                base_confidence: HashMap::new(),
            }
        })
    }
}
