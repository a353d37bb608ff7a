// eshop server entry point

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use eshop::cli::{self, Cli, Commands};
use eshop::config::ShopConfig;
use eshop::database::Database;
use eshop::signals::{self, ShutdownCoordinator};
use eshop::{http, observability, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config } => {
            observability::init()?;
            run_server(&config).await
        }
        command => cli::commands::execute(command).await,
    };

    if let Err(e) = &result {
        cli::error(&format!("{:#}", e));
    }
    result
}

/// Run the storefront until SIGTERM/SIGINT
async fn run_server(config_path: &str) -> Result<()> {
    let config = ShopConfig::load(config_path)?;
    cli::print_banner(&config.shop.title);

    let db = Database::open(&config.database.path)?;
    let sweep_interval = config.session.sweep_interval();
    let state = AppState::new(config, db);
    info!(
        port = state.config.server.port,
        paypal = state.config.paypal.enabled,
        "Storefront state initialized"
    );

    let coordinator = ShutdownCoordinator::new();
    let sweeper = state.sessions.spawn_sweeper(sweep_interval, coordinator.subscribe());

    let shutdown_signal = signals::create_shutdown_listener()?;
    let mut server = tokio::spawn(http::serve(state.clone(), coordinator.notified()));

    cli::info(&format!(
        "Listening on http://{}:{}",
        state.config.server.bind_addr, state.config.server.port
    ));
    cli::info("Press Ctrl+C for graceful shutdown");

    let finished = tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received - draining connections");
            None
        }
        result = &mut server => Some(result),
    };

    coordinator.trigger();
    let served = match finished {
        Some(result) => result,
        None => server.await,
    };

    if let Err(e) = sweeper.await {
        warn!(error = %e, "Session sweeper ended abnormally");
    }
    served??;

    info!(sessions = state.sessions.len(), "Storefront stopped");
    Ok(())
}
