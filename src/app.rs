//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::ScriptRunner,
    dispatch::Dispatcher,
    handlers::HandlerTable,
    internal_metrics::{Metrics, MetricsBuilder},
    rate_limiter::RateLimiter,
    reporter::{run_reporter, DispatchReport},
    script::ProcessRunner,
    server::{router, IngestServer, IngestState},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use async_channel::Sender;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    local_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the webhook server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for services to stop...");

        let panicked = self.task_manager.shutdown().await;
        if panicked > 0 {
            anyhow::bail!("{} service tasks panicked during shutdown", panicked);
        }
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// replace the script runner or observe dispatch reports.
pub struct AppBuilder {
    config: Config,
    script_runner_override: Option<Arc<dyn ScriptRunner>>,
    report_observer: Option<Sender<DispatchReport>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            script_runner_override: None,
            report_observer: None,
        }
    }

    /// Replaces the process-backed script runner.
    pub fn script_runner_override(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.script_runner_override = Some(runner);
        self
    }

    /// Receives a copy of every dispatch report once it has been logged.
    pub fn report_observer(mut self, observer: Sender<DispatchReport>) -> Self {
        self.report_observer = Some(observer);
        self
    }

    /// Builds and starts all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let (metrics, metrics_server) = MetricsBuilder::new(config.metrics.clone())
            .build(task_manager.shutdown_rx())
            .await?;
        let metrics: Arc<Metrics> = Arc::new(metrics);
        let metrics_addr = metrics_server.map(|(server, addr)| {
            task_manager.spawn("MetricsServer", server.run());
            addr
        });

        // =========================================================================
        // 2. Dispatch pipeline
        // =========================================================================
        let handlers = Arc::new(HandlerTable::new(config.alerts.clone()));
        debug!(handlers = handlers.len(), "Handler table built");

        let rate_limiter = Arc::new(
            RateLimiter::new(config.rate_limit_per_second)
                .context("invalid rate-limit-per-second")?,
        );
        let runner = self
            .script_runner_override
            .unwrap_or_else(|| Arc::new(ProcessRunner::new()) as Arc<dyn ScriptRunner>);
        let dispatcher = Arc::new(Dispatcher::new(
            handlers,
            config.script_directory.clone(),
            rate_limiter,
            runner,
        ));

        let (reports_tx, reports_rx) = async_channel::unbounded();
        task_manager.spawn(
            "DispatchReporter",
            run_reporter(
                task_manager.shutdown_rx(),
                reports_rx,
                self.report_observer,
                metrics.clone(),
            ),
        );

        // =========================================================================
        // 3. Webhook server
        // =========================================================================
        let listen_address = config.listen_address();
        let listener = TcpListener::bind(&listen_address)
            .await
            .with_context(|| format!("failed to listen on {}", listen_address))?;
        let local_addr = listener.local_addr()?;

        let route_path = config.route_path();
        let state = IngestState {
            dispatcher,
            reports: reports_tx,
            metrics,
        };
        let server = IngestServer::new(
            listener,
            router(&route_path, state, &config.server),
            Duration::from_secs(config.server.idle_timeout_seconds),
            task_manager.shutdown_rx(),
        );
        task_manager.spawn("WebhookServer", server.run());

        info!("Listening on {} at {}", local_addr, route_path);

        Ok(App {
            task_manager,
            local_addr,
            metrics_addr,
        })
    }
}
