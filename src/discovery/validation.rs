//! Cross-validation of consolidated entities.
//!
//! Corroborated entities are boosted, entities whose namespace is still
//! present are boosted again and the rest penalized. Anything left under the
//! confidence threshold is dropped and only counted.

use super::types::{DiscoveredEntity, EntityDetails};
use crate::cluster::{ClusterAccessor, MAX_CONCURRENT_REQUESTS};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};

pub const CORROBORATION_BOOST: f64 = 1.2;
pub const NAMESPACE_PRESENT_BOOST: f64 = 1.1;
pub const NAMESPACE_MISSING_PENALTY: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct ValidationOutcome<D> {
    pub entities: Vec<DiscoveredEntity<D>>,
    pub dropped: usize,
}

/// Apply both adjustments to a single confidence value.
pub fn adjust_confidence(confidence: f64, corroborated: bool, namespace_exists: bool) -> f64 {
    let mut adjusted = confidence;
    if corroborated {
        adjusted = (adjusted * CORROBORATION_BOOST).min(1.0);
    }
    adjusted *= if namespace_exists {
        NAMESPACE_PRESENT_BOOST
    } else {
        NAMESPACE_MISSING_PENALTY
    };
    adjusted.clamp(0.0, 1.0)
}

/// Look up each distinct namespace once. A failed lookup counts as missing.
async fn namespace_presence(
    accessor: &dyn ClusterAccessor,
    namespaces: BTreeSet<&str>,
) -> HashMap<String, bool> {
    stream::iter(
        namespaces
            .into_iter()
            .map(|ns| async move {
                let exists = match accessor.get_namespace(ns).await {
                    Ok(found) => found.is_some(),
                    Err(e) => {
                        log::debug!("Namespace check for {} failed: {}", ns, e);
                        false
                    }
                };
                (ns.to_string(), exists)
            })
            .collect::<Vec<_>>(),
    )
    .buffer_unordered(MAX_CONCURRENT_REQUESTS)
        .collect()
        .await
}

/// Re-score consolidated entities and drop those below `threshold`.
pub async fn cross_validate<D: EntityDetails>(
    accessor: &dyn ClusterAccessor,
    entities: Vec<DiscoveredEntity<D>>,
    threshold: f64,
) -> ValidationOutcome<D> {
    let presence = namespace_presence(
        accessor,
        entities.iter().map(|e| e.namespace.as_str()).collect(),
    )
    .await;

    let total = entities.len();
    let kept: Vec<DiscoveredEntity<D>> = entities
        .into_iter()
        .filter_map(|mut entity| {
            let exists = presence.get(&entity.namespace).copied().unwrap_or(false);
            entity.confidence = adjust_confidence(entity.confidence, entity.is_corroborated(), exists);
            (entity.confidence >= threshold).then_some(entity)
        })
        .collect();

    let dropped = total - kept.len();
    if dropped > 0 {
        log::info!(
            "Dropped {} of {} {} entities below confidence {}",
            dropped,
            total,
            D::KIND,
            threshold
        );
    }

    ValidationOutcome {
        entities: kept,
        dropped,
    }
}
