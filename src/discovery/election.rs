//! Home namespace election.
//!
//! Each namespace accumulates an additive score from independent signals:
//!
//! | Signal                                   | Points            |
//! |------------------------------------------|-------------------|
//! | Name matches a namespace pattern         | 20 (first only)   |
//! | Significant label present                | 15 per label      |
//! | Workload looks like a system component   | 10 per workload   |
//! | Service looks like a system component    | 8 per service     |
//! | Config object mentions the system        | 5 per object      |
//!
//! Sub-scans that fail contribute nothing. Ranking is a stable descending
//! sort, so ties go to the namespace listed first.

use super::rules::DiscoveryRules;
use super::types::{HomeNamespace, NamespaceSource};
use crate::cluster::{ClusterAccessor, MAX_CONCURRENT_REQUESTS, NamespaceInfo, list_all_workloads};
use crate::error::{DiscoveryError, Result};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::cmp::Ordering;

pub const NAME_PATTERN_SCORE: f64 = 20.0;
pub const SIGNIFICANT_LABEL_SCORE: f64 = 15.0;
pub const WORKLOAD_SCORE: f64 = 10.0;
pub const SERVICE_SCORE: f64 = 8.0;
pub const CONFIG_OBJECT_SCORE: f64 = 5.0;

/// A scored namespace. Only lives for the duration of one election.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceCandidate {
    pub name: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

impl NamespaceCandidate {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            score: 0.0,
            reasons: Vec::new(),
        }
    }

    fn add(&mut self, points: f64, reason: String) {
        self.score += points;
        self.reasons.push(reason);
    }
}

/// Score one namespace against every signal.
pub async fn score_namespace(
    accessor: &dyn ClusterAccessor,
    rules: &DiscoveryRules,
    namespace: &NamespaceInfo,
) -> NamespaceCandidate {
    let mut candidate = NamespaceCandidate::new(&namespace.name);

    if rules.is_excluded_namespace(&namespace.name) {
        return candidate;
    }

    if let Some(pattern) = rules.matching_namespace_pattern(&namespace.name) {
        candidate.add(
            NAME_PATTERN_SCORE,
            format!("name matches pattern '{}'", pattern.as_str()),
        );
    }

    for requirement in &rules.significant_labels {
        if requirement.matches(&namespace.labels) {
            candidate.add(
                SIGNIFICANT_LABEL_SCORE,
                format!("carries label '{}'", requirement),
            );
        }
    }

    let ns = namespace.name.as_str();
    let ((workloads, workload_errors), services, config_objects) = tokio::join!(
        list_all_workloads(accessor, ns, None),
        accessor.list_services(ns, None),
        accessor.list_config_objects(ns),
    );

    for error in &workload_errors {
        log::debug!("Election workload scan in {} incomplete: {}", ns, error);
    }
    for workload in workloads
        .iter()
        .filter(|w| rules.is_system_evidence(&w.name, &w.labels, &w.annotations))
    {
        candidate.add(
            WORKLOAD_SCORE,
            format!("{} '{}' matches system keywords", workload.kind, workload.name),
        );
    }

    match services {
        Ok(services) => {
            for service in services
                .iter()
                .filter(|s| rules.is_system_evidence(&s.name, &s.labels, &s.annotations))
            {
                candidate.add(
                    SERVICE_SCORE,
                    format!("service '{}' matches system keywords", service.name),
                );
            }
        }
        Err(e) => log::debug!("Election service scan in {} failed: {}", ns, e),
    }

    match config_objects {
        Ok(objects) => {
            for object in objects
                .iter()
                .filter(|c| rules.is_system_evidence(&c.name, &c.labels, &c.annotations))
            {
                candidate.add(
                    CONFIG_OBJECT_SCORE,
                    format!("config object '{}' matches system keywords", object.name),
                );
            }
        }
        Err(e) => log::debug!("Election config object scan in {} failed: {}", ns, e),
    }

    candidate
}

/// Sort candidates by descending score, keeping enumeration order on ties.
pub fn rank_candidates(mut candidates: Vec<NamespaceCandidate>) -> Vec<NamespaceCandidate> {
    // `sort_by` is stable.
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}

/// Score and rank every namespace in the cluster.
pub async fn rank_namespaces(
    accessor: &dyn ClusterAccessor,
    rules: &DiscoveryRules,
) -> Result<Vec<NamespaceCandidate>> {
    let namespaces = accessor.list_namespaces().await?;
    log::debug!("Scoring {} namespaces for election", namespaces.len());

    // `buffered` keeps enumeration order, which tie-breaking relies on.
    let scored: Vec<NamespaceCandidate> = stream::iter(
        namespaces
            .iter()
            .map(|ns| score_namespace(accessor, rules, ns))
            .collect::<Vec<_>>(),
    )
    .buffered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await;

    Ok(rank_candidates(scored))
}

fn leading(ranked: &[NamespaceCandidate]) -> Option<&NamespaceCandidate> {
    ranked.first().filter(|winner| winner.score > 0.0)
}

fn configured(name: &str) -> HomeNamespace {
    HomeNamespace {
        name: name.to_string(),
        source: NamespaceSource::Configured,
    }
}

/// Pick the best-scoring namespace.
///
/// Fails with [`DiscoveryError::NoNamespaceCandidate`] when nothing scores
/// above zero.
pub async fn elect_namespace(
    accessor: &dyn ClusterAccessor,
    rules: &DiscoveryRules,
) -> Result<NamespaceCandidate> {
    let ranked = rank_namespaces(accessor, rules).await?;
    leading(&ranked)
        .cloned()
        .ok_or(DiscoveryError::NoNamespaceCandidate)
}

/// Derive the home namespace from a ranking that has already been computed:
/// configured, the elected leader, or the fallback.
pub fn home_from_ranking(
    rules: &DiscoveryRules,
    ranking: std::result::Result<&[NamespaceCandidate], &DiscoveryError>,
) -> HomeNamespace {
    if let Some(name) = rules.home_namespace() {
        return configured(name);
    }

    let reason = match ranking {
        Ok(ranked) => match leading(ranked) {
            Some(winner) => {
                log::info!(
                    "Elected home namespace '{}' (score {})",
                    winner.name,
                    winner.score
                );
                return HomeNamespace {
                    name: winner.name.clone(),
                    source: NamespaceSource::Elected {
                        score: winner.score,
                    },
                };
            }
            None => DiscoveryError::NoNamespaceCandidate.to_string(),
        },
        Err(e) => e.to_string(),
    };

    log::warn!(
        "Namespace election failed ({}), falling back to '{}'",
        reason,
        rules.fallback_namespace()
    );
    HomeNamespace {
        name: rules.fallback_namespace().to_string(),
        source: NamespaceSource::Fallback { reason },
    }
}

/// Resolve the home namespace: configured, elected, or the fallback.
pub async fn resolve_home_namespace(
    accessor: &dyn ClusterAccessor,
    rules: &DiscoveryRules,
) -> HomeNamespace {
    if let Some(name) = rules.home_namespace() {
        return configured(name);
    }
    let ranked = rank_namespaces(accessor, rules).await;
    home_from_ranking(rules, ranked.as_deref())
}
