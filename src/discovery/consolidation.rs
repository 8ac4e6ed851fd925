//! Merging per-strategy findings into one record per identity key.

use super::types::{DiscoveredEntity, EntityDetails, StrategyRunResult};
use std::collections::{BTreeMap, HashMap};

/// Fold `incoming` into `existing`.
///
/// Confidence is the plain average of the two, methods are concatenated,
/// `last_seen` only moves forward, and incoming labels and annotations win
/// on key collision.
pub fn merge_entity<D: EntityDetails>(
    existing: &mut DiscoveredEntity<D>,
    incoming: &DiscoveredEntity<D>,
) {
    existing.confidence = (existing.confidence + incoming.confidence) / 2.0;
    existing
        .discovery_methods
        .extend(incoming.discovery_methods.iter().cloned());
    if incoming.last_seen > existing.last_seen {
        existing.last_seen = incoming.last_seen;
    }
    existing.labels.extend(
        incoming
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    existing.annotations.extend(
        incoming
            .annotations
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    existing.details.merge_from(&incoming.details);
}

/// Deduplicate the raw entities of every strategy run.
///
/// Strategies are visited in key order and entities in the order each
/// strategy reported them. An entity seen by three or more strategies is
/// folded in pairwise, so its confidence depends on that order.
pub fn consolidate<D: EntityDetails>(
    results: &BTreeMap<String, StrategyRunResult<D>>,
) -> Vec<DiscoveredEntity<D>> {
    let mut merged: Vec<DiscoveredEntity<D>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in results.values() {
        for entity in &result.entities {
            let key = entity.identity_key();
            match index.get(&key) {
                Some(&position) => merge_entity(&mut merged[position], entity),
                None => {
                    index.insert(key, merged.len());
                    merged.push(entity.clone());
                }
            }
        }
    }

    log::debug!(
        "Consolidated {} raw {} entities into {}",
        results.values().map(|r| r.entities.len()).sum::<usize>(),
        D::KIND,
        merged.len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::types::{
        ComponentDetails, ComponentEntity, ComponentType, TenantDetails, TenantEntity,
    };
    use chrono::{DateTime, Duration as TimeDelta, Utc};
    use proptest::prelude::*;
    use std::time::Duration;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn tenant(strategy: &str, ns: &str, confidence: f64) -> TenantEntity {
        TenantEntity::new(ns, ns, strategy, confidence, epoch(), TenantDetails::default())
    }

    fn run<D>(strategy: &str, entities: Vec<DiscoveredEntity<D>>) -> StrategyRunResult<D> {
        StrategyRunResult {
            strategy_id: strategy.to_string(),
            description: String::new(),
            matched: entities.len(),
            scanned: entities.len(),
            entities,
            confidence: 1.0,
            errors: Vec::new(),
            failed: false,
            placeholder: false,
            duration: Duration::ZERO,
            timestamp: epoch(),
        }
    }

    fn results<D>(runs: Vec<StrategyRunResult<D>>) -> BTreeMap<String, StrategyRunResult<D>> {
        runs.into_iter().map(|r| (r.strategy_id.clone(), r)).collect()
    }

    #[test]
    fn test_two_strategies_average() {
        let merged = consolidate(&results(vec![
            run("name-pattern", vec![tenant("name-pattern", "team-a", 0.9)]),
            run("label-match", vec![tenant("label-match", "team-a", 0.7)]),
        ]));

        assert_eq!(merged.len(), 1);
        assert!((merged[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(merged[0].discovery_methods.len(), 2);
        assert!(merged[0].is_corroborated());
    }

    #[test]
    fn test_distinct_keys_stay_separate() {
        let merged = consolidate(&results(vec![run(
            "a",
            vec![tenant("a", "team-a", 0.7), tenant("a", "team-b", 0.7)],
        )]));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_unions_labels_and_advances_last_seen() {
        let mut existing = tenant("a", "team-a", 0.6);
        existing.labels.insert("tier".into(), "gold".into());
        existing.labels.insert("owner".into(), "x".into());

        let mut incoming = tenant("b", "team-a", 0.6);
        incoming.labels.insert("owner".into(), "y".into());
        incoming.last_seen = epoch() + TimeDelta::seconds(30);

        merge_entity(&mut existing, &incoming);
        assert_eq!(existing.labels.get("tier").map(String::as_str), Some("gold"));
        assert_eq!(existing.labels.get("owner").map(String::as_str), Some("y"));
        assert_eq!(existing.last_seen, incoming.last_seen);

        // An older observation never moves last_seen back.
        let stale = tenant("c", "team-a", 0.6);
        merge_entity(&mut existing, &stale);
        assert_eq!(existing.last_seen, epoch() + TimeDelta::seconds(30));
        assert_eq!(existing.source_strategy, "a");
    }

    #[test]
    fn test_component_topology_later_wins() {
        let mut first = ComponentEntity::new(
            "mimir",
            "mimir-ingester-zone-a",
            "workload-name-pattern",
            0.9,
            epoch(),
            ComponentDetails {
                zone: "zone-a".into(),
                ..ComponentDetails::of_type(ComponentType::Ingester)
            },
        );
        let second = ComponentEntity::new(
            "mimir",
            "mimir-ingester-zone-a",
            "workload-label",
            0.7,
            epoch(),
            ComponentDetails {
                availability_zone: "us-east-1a".into(),
                ..ComponentDetails::default()
            },
        );

        merge_entity(&mut first, &second);
        assert_eq!(first.details.zone, "zone-a");
        assert_eq!(first.details.availability_zone, "us-east-1a");
        assert_eq!(first.details.component_type, ComponentType::Ingester);
    }

    #[test]
    fn test_three_way_merge_is_pairwise() {
        let merged = consolidate(&results(vec![
            run("a", vec![tenant("a", "team-a", 1.0)]),
            run("b", vec![tenant("b", "team-a", 0.6)]),
            run("c", vec![tenant("c", "team-a", 0.6)]),
        ]));
        // ((1.0 + 0.6) / 2 + 0.6) / 2
        assert!((merged[0].confidence - 0.7).abs() < 1e-9);
        assert_eq!(merged[0].discovery_methods, vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn prop_identical_evidence_does_not_drift(confidence in 0.0f64..=1.0) {
            let mut entity = tenant("a", "team-a", confidence);
            let copy = entity.clone();
            merge_entity(&mut entity, &copy);
            prop_assert!((entity.confidence - confidence).abs() < 1e-12);
        }

        #[test]
        fn prop_merge_stays_within_inputs(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let mut entity = tenant("a", "team-a", a);
            merge_entity(&mut entity, &tenant("b", "team-a", b));
            prop_assert!(entity.confidence >= a.min(b) - 1e-12);
            prop_assert!(entity.confidence <= a.max(b) + 1e-12);
        }
    }
}
