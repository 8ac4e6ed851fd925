use crate::cache::{CacheStatus, DiscoveryCache, InventoryStatus};
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::handlers::Session;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

/// Warm both inventories and print the cache status.
pub async fn handle_status(session: &Session, format: OutputFormat) -> Result<()> {
    let cache = session.cache();
    if let Err(e) = cache.warm_up().await {
        log::warn!("Warm-up incomplete: {}", e);
    }

    let status = cache.status();
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&status)?,
        OutputFormat::Table => render_status(&status),
    };
    println!("{}", output);
    Ok(())
}

/// Run the background refresh loop and print one status line per interval
/// until interrupted or `iterations` reports have been printed.
pub async fn handle_watch(
    mut session: Session,
    interval: Option<u64>,
    iterations: Option<u32>,
) -> Result<()> {
    if let Some(secs) = interval {
        session.config.cache.refresh_interval_secs = secs.max(1);
        session.config.cache.background_refresh = true;
    }
    let report_every = session.config.cache.refresh_interval();
    let cache = session.cache();

    if let Err(e) = cache.warm_up().await {
        log::warn!("Warm-up incomplete: {}", e);
    }
    cache.start_background_refresh();
    println!(
        "{} refreshing every {}s, press Ctrl+C to stop\n",
        "👀 Watching".bright_white().bold(),
        report_every.as_secs()
    );
    println!("{}", status_line(&cache.status()));

    let stopped = watch_loop(&cache, report_every, iterations).await;
    cache.stop_background_refresh().await;
    if stopped {
        println!("\n{}", "Stopped.".dimmed());
    }
    Ok(())
}

/// Returns `true` when interrupted.
async fn watch_loop(cache: &Arc<DiscoveryCache>, every: Duration, iterations: Option<u32>) -> bool {
    let mut reported = 0u32;
    loop {
        if iterations.is_some_and(|max| reported >= max) {
            return false;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return true,
            _ = tokio::time::sleep(every) => {}
        }
        println!("{}", status_line(&cache.status()));
        reported += 1;
    }
}

fn inventory_summary(label: &str, status: &InventoryStatus) -> String {
    let state = if !status.is_cached {
        "empty".dimmed()
    } else if status.is_valid {
        "valid".green()
    } else {
        "expired".yellow()
    };
    let age = status
        .age
        .map(|a| format!("{}s", a.as_secs()))
        .unwrap_or_else(|| "-".to_string());
    let mut text = format!(
        "{} {} ({}, age {}, {} refreshes)",
        label.bright_white(),
        status.entity_count,
        state,
        age,
        status.refresh_count
    );
    if let Some(error) = &status.last_error {
        text.push_str(&format!(" {}", format!("last error: {}", error).red()));
    }
    text
}

fn status_line(status: &CacheStatus) -> String {
    format!(
        "[{}] {}  {}",
        chrono::Utc::now().format("%H:%M:%S"),
        inventory_summary("tenants:", &status.tenants),
        inventory_summary("components:", &status.components)
    )
}

fn inventory_block(title: &str, status: &InventoryStatus) -> String {
    let mut output = format!("┌─ {} \n", title).bright_blue().to_string();
    output.push_str(&format!(
        "│ {} {:<8} {} {:<8} {} {}\n",
        "Cached:".dimmed(),
        status.is_cached,
        "Valid:".dimmed(),
        status.is_valid,
        "Entities:".dimmed(),
        status.entity_count
    ));
    output.push_str(&format!(
        "│ {} {}s     {} {}\n",
        "TTL:".dimmed(),
        status.ttl.as_secs(),
        "Age:".dimmed(),
        status
            .age
            .map(|a| format!("{}s", a.as_secs()))
            .unwrap_or_else(|| "-".to_string())
    ));
    if let Some(updated) = status.last_updated {
        output.push_str(&format!(
            "│ {} {}\n",
            "Last updated:".dimmed(),
            updated.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    output.push_str(&format!(
        "│ {} {}\n",
        "Refreshes:".dimmed(),
        status.refresh_count
    ));
    if let Some(error) = &status.last_error {
        output.push_str(&format!("│ {} {}\n", "Last error:".dimmed(), error.red()));
    }
    output.push_str(&"└─\n".bright_blue().to_string());
    output
}

fn render_status(status: &CacheStatus) -> String {
    let mut output = format!("\n{}\n\n", "📦 DISCOVERY CACHE STATUS".bright_white().bold());
    output.push_str(&inventory_block("Tenants", &status.tenants));
    output.push('\n');
    output.push_str(&inventory_block("Components", &status.components));
    output.push('\n');

    let background = if status.config.background_refresh_running {
        "running".green()
    } else if status.config.background_refresh_enabled {
        "enabled, not running".yellow()
    } else {
        "disabled".dimmed()
    };
    output.push_str(&format!(
        "{} {} (every {}s)\n",
        "Background refresh:".dimmed(),
        background,
        status.config.refresh_interval.as_secs()
    ));
    output
}
