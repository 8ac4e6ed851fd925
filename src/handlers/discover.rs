use crate::cli::OutputFormat;
use crate::discovery::{
    ComponentDetails, ComponentEntity, ComprehensiveDiscoveryResult, DiscoveredEntity,
    EntityDetails, HomeNamespace, NamespaceCandidate, NamespaceSource, TenantEntity,
};
use crate::error::Result;
use crate::handlers::Session;
use colored::Colorize;
use serde::Serialize;

const RULE: &str =
    "═══════════════════════════════════════════════════════════════════════════════";
const SECTION_END: &str =
    "└──────────────────────────────────────────────────────────────────────────────┘";

pub async fn handle_tenants(
    session: &Session,
    format: OutputFormat,
    min_confidence: Option<f64>,
    show_strategies: bool,
) -> Result<()> {
    let inventory = session.cache().get_tenant_inventory().await?;
    let inventory = filter_by_confidence(&inventory, min_confidence);
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&inventory)?,
        OutputFormat::Table => render_inventory(
            "🏢 MIMIR TENANTS",
            &inventory,
            show_strategies,
            tenant_row,
        ),
    };
    println!("{}", output);
    Ok(())
}

pub async fn handle_components(
    session: &Session,
    format: OutputFormat,
    min_confidence: Option<f64>,
    show_strategies: bool,
) -> Result<()> {
    let inventory = session.cache().get_component_inventory().await?;
    let inventory = filter_by_confidence(&inventory, min_confidence);
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&inventory)?,
        OutputFormat::Table => render_inventory(
            "🧩 MIMIR COMPONENTS",
            &inventory,
            show_strategies,
            component_row,
        ),
    };
    println!("{}", output);
    Ok(())
}

#[derive(Serialize)]
struct ElectionReport<'a> {
    home_namespace: &'a HomeNamespace,
    candidates: &'a [NamespaceCandidate],
}

pub async fn handle_elect(session: &Session, format: OutputFormat) -> Result<()> {
    let (home, candidates) = session.engine.election().await?;

    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&ElectionReport {
            home_namespace: &home,
            candidates: &candidates,
        })?,
        OutputFormat::Table => render_election(&home, &candidates),
    };
    println!("{}", output);
    Ok(())
}

/// Display-only cutoff on top of the engine's own threshold.
fn filter_by_confidence<D: EntityDetails>(
    inventory: &ComprehensiveDiscoveryResult<D>,
    min_confidence: Option<f64>,
) -> ComprehensiveDiscoveryResult<D> {
    let mut inventory = inventory.clone();
    if let Some(min) = min_confidence {
        inventory.entities.retain(|e| e.confidence >= min);
    }
    inventory
}

// ============================================================================
// Table Format
// ============================================================================

fn describe_home(home: &HomeNamespace) -> String {
    match &home.source {
        NamespaceSource::Configured => format!("{} (configured)", home.name),
        NamespaceSource::Elected { score } => format!("{} (elected, score {})", home.name, score),
        NamespaceSource::Fallback { reason } => format!("{} (fallback: {})", home.name, reason),
    }
}

fn confidence_cell(confidence: f64) -> String {
    let text = format!("{:.2}", confidence);
    if confidence >= 0.8 {
        text.green().to_string()
    } else if confidence >= 0.6 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

fn tenant_row(tenant: &TenantEntity) -> String {
    let org_id = if tenant.details.org_id.is_empty() {
        "-".dimmed().to_string()
    } else {
        tenant.details.org_id.cyan().to_string()
    };
    format!(
        "│ {:<28} {:<22} {} {:<16} {}\n",
        tenant.name.bright_white(),
        tenant.namespace,
        confidence_cell(tenant.confidence),
        org_id,
        tenant.discovery_methods.join(", ").dimmed()
    )
}

fn component_row(component: &ComponentEntity) -> String {
    let ComponentDetails {
        component_type,
        replicas,
        ready_replicas,
        zone,
        ..
    } = &component.details;
    let replicas = match (replicas, ready_replicas) {
        (Some(r), Some(ready)) => format!("{}/{}", ready, r),
        (Some(r), None) => r.to_string(),
        _ => "-".to_string(),
    };
    let mut row = format!(
        "│ {:<32} {:<18} {} {:>7} {}\n",
        component.name.bright_white(),
        component_type.to_string().cyan(),
        confidence_cell(component.confidence),
        replicas,
        component.discovery_methods.join(", ").dimmed()
    );
    if !zone.is_empty() {
        row.push_str(&format!("│   {} {}\n", "Zone:".dimmed(), zone));
    }
    row
}

fn render_inventory<D, F>(
    title: &str,
    inventory: &ComprehensiveDiscoveryResult<D>,
    show_strategies: bool,
    row: F,
) -> String
where
    D: EntityDetails,
    F: Fn(&DiscoveredEntity<D>) -> String,
{
    let mut output = String::new();

    output.push_str(&format!("\n{}\n", RULE.bright_blue()));
    output.push_str(&format!("{}\n", title.bright_white().bold()));
    output.push_str(&format!("{}\n\n", RULE.bright_blue()));

    output.push_str(&format!(
        "{}\n",
        "┌─ Summary ────────────────────────────────────────────────────────────────────┐"
            .bright_blue()
    ));
    output.push_str(&format!(
        "│ {} {}\n",
        "Home namespace:".dimmed(),
        describe_home(&inventory.home_namespace).cyan()
    ));
    output.push_str(&format!(
        "│ {} {:>4}     {} {}/{}     {} {:>4}\n",
        "Entities:".dimmed(),
        inventory.entity_count().to_string().bright_white(),
        "Strategies:".dimmed(),
        inventory.successful_strategies,
        inventory.total_strategies,
        "Dropped:".dimmed(),
        inventory.dropped_entities,
    ));
    output.push_str(&format!(
        "│ {} {}ms     {} {}\n",
        "Duration:".dimmed(),
        inventory.duration.as_millis(),
        "Observed:".dimmed(),
        inventory.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    ));
    output.push_str(&format!("{}\n", SECTION_END.bright_blue()));

    if inventory.entities.is_empty() {
        output.push_str(&format!("\n{}\n", "No entities found.".yellow()));
    } else {
        output.push_str(&format!(
            "\n{}\n",
            "┌─ Inventory ──────────────────────────────────────────────────────────────────┐"
                .bright_blue()
        ));
        for entity in &inventory.entities {
            output.push_str(&row(entity));
        }
        output.push_str(&format!("{}\n", SECTION_END.bright_blue()));
    }

    if show_strategies {
        output.push_str(&format!(
            "\n{}\n",
            "┌─ Strategies ─────────────────────────────────────────────────────────────────┐"
                .bright_blue()
        ));
        for (id, run) in &inventory.strategies {
            let status = if run.placeholder {
                "skipped".dimmed()
            } else if run.failed {
                "failed".red()
            } else {
                "ok".green()
            };
            output.push_str(&format!(
                "│ {:<26} {:<8} {:.2}  scanned {:>4}  matched {:>4}  {}ms\n",
                id.bright_white(),
                status,
                run.confidence,
                run.scanned,
                run.matched,
                run.duration.as_millis()
            ));
            if !run.description.is_empty() {
                output.push_str(&format!("│   {}\n", run.description.dimmed()));
            }
            for error in &run.errors {
                output.push_str(&format!("│   {} {}\n", "!".yellow(), error.dimmed()));
            }
        }
        output.push_str(&format!("{}\n", SECTION_END.bright_blue()));
    }

    if !inventory.errors.is_empty() {
        output.push_str(&format!("\n{}\n", "Strategy failures:".red().bold()));
        for error in &inventory.errors {
            output.push_str(&format!("  {} {}\n", "✗".red(), error));
        }
    }

    output
}

fn render_election(home: &HomeNamespace, candidates: &[NamespaceCandidate]) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{}\n", RULE.bright_blue()));
    output.push_str(&format!("{}\n", "🗳️  HOME NAMESPACE ELECTION".bright_white().bold()));
    output.push_str(&format!("{}\n\n", RULE.bright_blue()));
    output.push_str(&format!(
        "{} {}\n\n",
        "Selected:".dimmed(),
        describe_home(home).green().bold()
    ));

    let scored: Vec<_> = candidates.iter().filter(|c| c.score > 0.0).collect();
    if scored.is_empty() {
        output.push_str(&format!("{}\n", "No namespace scored above zero.".yellow()));
        return output;
    }

    for (rank, candidate) in scored.iter().enumerate() {
        output.push_str(&format!(
            "{:>3}. {:<32} {:>6}\n",
            rank + 1,
            candidate.name.bright_white(),
            candidate.score.to_string().cyan()
        ));
        for reason in &candidate.reasons {
            output.push_str(&format!("       {} {}\n", "·".dimmed(), reason.dimmed()));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ComponentType, StrategyRunResult, TenantDetails};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn inventory() -> ComprehensiveDiscoveryResult<TenantDetails> {
        let at = DateTime::<Utc>::UNIX_EPOCH;
        let mut strategies = BTreeMap::new();
        strategies.insert(
            "namespace-label".to_string(),
            StrategyRunResult {
                strategy_id: "namespace-label".to_string(),
                description: "Namespaces carrying a tenant label".to_string(),
                entities: Vec::new(),
                confidence: 0.7,
                errors: vec!["listing ingresses: forbidden".to_string()],
                scanned: 4,
                matched: 2,
                failed: false,
                placeholder: false,
                duration: Duration::from_millis(12),
                timestamp: at,
            },
        );
        let tenant = |name: &str, confidence: f64| {
            TenantEntity::new(
                name,
                name,
                "namespace-label",
                confidence,
                at,
                TenantDetails {
                    org_id: name.to_string(),
                },
            )
        };
        ComprehensiveDiscoveryResult {
            kind: TenantDetails::KIND,
            home_namespace: HomeNamespace {
                name: "mimir".to_string(),
                source: NamespaceSource::Elected { score: 30.0 },
            },
            strategies,
            entities: vec![tenant("team-a", 0.9), tenant("team-b", 0.55)],
            total_strategies: 1,
            successful_strategies: 1,
            dropped_entities: 0,
            errors: Vec::new(),
            duration: Duration::from_millis(40),
            timestamp: at,
        }
    }

    #[test]
    fn test_min_confidence_filters_display_only() {
        let full = inventory();
        let filtered = filter_by_confidence(&full, Some(0.6));
        assert_eq!(filtered.entities.len(), 1);
        assert_eq!(filtered.entities[0].name, "team-a");
        assert_eq!(full.entities.len(), 2);
        assert_eq!(filter_by_confidence(&full, None).entities.len(), 2);
    }

    #[test]
    fn test_inventory_table_lists_entities() {
        let output = render_inventory("TENANTS", &inventory(), true, tenant_row);
        assert!(output.contains("team-a"));
        assert!(output.contains("team-b"));
        assert!(output.contains("elected, score 30"));
        assert!(output.contains("listing ingresses: forbidden"));
        assert!(output.contains("Namespaces carrying a tenant label"));

        let hidden = render_inventory("TENANTS", &inventory(), false, tenant_row);
        assert!(!hidden.contains("Namespaces carrying a tenant label"));
    }

    #[test]
    fn test_component_row_shows_replicas_and_zone() {
        let mut details = ComponentDetails::of_type(ComponentType::Ingester);
        details.replicas = Some(3);
        details.ready_replicas = Some(2);
        details.zone = "zone-a".to_string();
        let component = ComponentEntity::new(
            "mimir",
            "ingester-zone-a",
            "workload-name-pattern",
            0.9,
            DateTime::<Utc>::UNIX_EPOCH,
            details,
        );

        let row = component_row(&component);
        assert!(row.contains("2/3"));
        assert!(row.contains("zone-a"));
    }

    #[test]
    fn test_election_table_skips_zero_scores() {
        let home = HomeNamespace {
            name: "mimir".to_string(),
            source: NamespaceSource::Configured,
        };
        let candidates = vec![
            NamespaceCandidate {
                name: "mimir".to_string(),
                score: 30.0,
                reasons: vec!["name matches 'mimir'".to_string()],
            },
            NamespaceCandidate {
                name: "kube-system".to_string(),
                score: 0.0,
                reasons: Vec::new(),
            },
        ];

        let output = render_election(&home, &candidates);
        assert!(output.contains("mimir (configured)"));
        assert!(!output.contains("kube-system"));
    }
}
