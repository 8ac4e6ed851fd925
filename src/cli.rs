use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mimir-discovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover Mimir components and tenants in a live Kubernetes cluster")]
#[command(long_about = "Scans namespaces, workloads, services, config objects and ingresses with several independent heuristics, merges what they find and scores every component and tenant with a confidence value. No static inventory is required.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true, env = "MIMIR_DISCOVERY_CONTEXT")]
    pub context: Option<String>,

    /// Home namespace of the monitored system (skips election)
    #[arg(short = 'n', long, global = true)]
    pub namespace: Option<String>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover tenants and print the consolidated inventory
    Tenants {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Hide tenants below this confidence (display only)
        #[arg(long, value_name = "SCORE")]
        min_confidence: Option<f64>,

        /// Include the per-strategy breakdown
        #[arg(long)]
        strategies: bool,
    },

    /// Discover components and print the consolidated inventory
    Components {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Hide components below this confidence (display only)
        #[arg(long, value_name = "SCORE")]
        min_confidence: Option<f64>,

        /// Include the per-strategy breakdown
        #[arg(long)]
        strategies: bool,
    },

    /// Rank namespaces as candidates for the home namespace
    Elect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Keep both inventories fresh in the background and print status on each refresh
    Watch {
        /// Seconds between background refresh ticks (overrides config)
        #[arg(short, long, value_name = "SECS")]
        interval: Option<u64>,

        /// Stop after this many status reports
        #[arg(long)]
        iterations: Option<u32>,
    },

    /// Warm the cache and print its status
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
