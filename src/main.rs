//! Alert Handler - Alertmanager webhook receiver
//!
//! Receives webhook notifications and runs the configured script for each
//! alert, paced by a process-wide rate limit.

use alert_handler::{app::App, cli::Cli, config::Config};
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().init();
            error!("Config not parsed correctly: {}", err);
            std::process::exit(1);
        }
    };

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Alert handler starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.listen_address());
    info!("URL Path: {}", config.route_path());
    info!("Script Directory: {}", config.script_directory.display());
    info!("Rate Limit: {}/s", config.rate_limit_per_second);
    info!("Alert Handlers: {}", config.alerts.len());
    info!(
        "Server Timeouts: read {}s, write {}s, idle {}s",
        config.server.read_timeout_seconds,
        config.server.write_timeout_seconds,
        config.server.idle_timeout_seconds
    );
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.as_str()
        } else {
            "Disabled"
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received. Shutting down gracefully..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("All tasks shut down. Exiting.");
    Ok(())
}
