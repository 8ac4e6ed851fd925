use clap::Parser;
use mimir_discovery::{
    cli::{Cli, Commands},
    handlers::{
        Session, SessionOptions, handle_components, handle_elect, handle_status, handle_tenants,
        handle_watch,
    },
};
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> mimir_discovery::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    let options = SessionOptions {
        config_path: cli.config.clone(),
        context: cli.context.clone(),
        namespace: cli.namespace.clone(),
    };
    let session = Session::connect(&options).await?;

    // Execute command
    match cli.command {
        Commands::Tenants {
            format,
            min_confidence,
            strategies,
        } => handle_tenants(&session, format, min_confidence, strategies).await,
        Commands::Components {
            format,
            min_confidence,
            strategies,
        } => handle_components(&session, format, min_confidence, strategies).await,
        Commands::Elect { format } => handle_elect(&session, format).await,
        Commands::Watch {
            interval,
            iterations,
        } => handle_watch(session, interval, iterations).await,
        Commands::Status { format } => handle_status(&session, format).await,
    }
}
