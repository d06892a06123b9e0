//! # Internal Metrics Module
//!
//! Counters for the alert pipeline and an optional Prometheus endpoint.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: Installs the Prometheus recorder, binds the
//!   listener for the metrics server and constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A cloneable handle the rest of the application uses to
//!   update the predefined counters.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::{Counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub alerts_received_total: Counter,
    pub requests_total: Counter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("requests_total", Unit::Count, "Total number of webhook requests received.");
        metrics::describe_counter!("requests_rejected_total", Unit::Count, "Webhook requests that dispatched nothing, labeled by reason.");
        metrics::describe_counter!("alerts_received_total", Unit::Count, "Total number of alerts decoded from webhook requests.");
        metrics::describe_counter!("dispatches_total", Unit::Count, "Finished dispatches, labeled by outcome.");

        Self {
            alerts_received_total: metrics::counter!("alerts_received_total"),
            requests_total: metrics::counter!("requests_total"),
        }
    }

    /// Counts a webhook request that was rejected before any dispatch.
    pub fn increment_rejected(&self, reason: &'static str) {
        metrics::counter!("requests_rejected_total", "reason" => reason).increment(1);
    }

    /// Counts a finished dispatch.
    pub fn increment_dispatch(&self, outcome: &'static str) {
        metrics::counter!("dispatches_total", "outcome" => outcome).increment(1);
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and prepares the metrics server.
    ///
    /// When metrics are disabled the returned handle still works, its
    /// updates simply go nowhere, and no server is returned.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Metrics, Option<(MetricsServer, SocketAddr)>)> {
        if !self.config.enabled {
            return Ok((Metrics::new(), None));
        }

        let listener = TcpListener::bind(&self.config.listen_address)
            .await
            .with_context(|| {
                format!(
                    "failed to bind metrics server to {}",
                    self.config.listen_address
                )
            })?;
        let addr = listener.local_addr()?;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);
        Ok((metrics, Some((server, addr))))
    }
}
