#![allow(dead_code)]
//! Test helpers for running the full application instance.

use alert_handler::{
    app::App, config::Config, reporter::DispatchReport, AlertHandler, ScriptRunner,
};
use anyhow::Result;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub route: String,
    pub reports_rx: async_channel::Receiver<DispatchReport>,
    shutdown_tx: watch::Sender<bool>,
    app_handle: JoinHandle<Result<()>>,
    client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, self.route)
    }

    pub async fn post(&self, body: &str) -> reqwest::Response {
        self.client
            .post(self.url())
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("request failed")
    }

    /// Waits for exactly `count` dispatch reports.
    pub async fn reports(&self, count: usize, timeout_duration: Duration) -> Vec<DispatchReport> {
        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            let report = timeout(timeout_duration, self.reports_rx.recv())
                .await
                .expect("Timed out waiting for dispatch reports")
                .expect("report channel closed");
            reports.push(report);
        }
        reports
    }

    /// Asserts that no dispatch report shows up within `wait`.
    pub async fn assert_no_reports(&self, wait: Duration) {
        tokio::time::sleep(wait).await;
        assert!(
            self.reports_rx.is_empty(),
            "expected no dispatches, got {}",
            self.reports_rx.len()
        );
    }

    /// Shuts down the application and waits for it to terminate.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx.send(true)?;
        match timeout(timeout_duration, self.app_handle).await {
            Ok(result) => result?,
            Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
        }
    }
}

/// A builder for creating `TestApp` instances.
pub struct TestAppBuilder {
    pub config: Config,
    runner: Option<Arc<dyn ScriptRunner>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.port = "127.0.0.1:0".to_string();
        config.url_path = "/alerts".to_string();
        config.script_directory = "/scripts/".into();
        config.rate_limit_per_second = 50;
        Self {
            config,
            runner: None,
        }
    }

    pub fn with_handler(mut self, summary: &str, script_type: &str, script: &str, args: &[&str]) -> Self {
        self.config.alerts.insert(
            summary.to_string(),
            AlertHandler {
                name: format!("{} handler", summary),
                summary: summary.to_string(),
                status: "firing".to_string(),
                script_name: script.to_string(),
                script_type: script_type.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_handlers(mut self, handlers: HashMap<String, AlertHandler>) -> Self {
        self.config.alerts.extend(handlers);
        self
    }

    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.config.rate_limit_per_second = per_second;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub async fn start(self) -> Result<TestApp> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (reports_tx, reports_rx) = async_channel::unbounded();
        let route = self.config.route_path();

        let mut builder = App::builder(self.config).report_observer(reports_tx);
        if let Some(runner) = self.runner {
            builder = builder.script_runner_override(runner);
        }
        let app = builder.build(shutdown_rx).await?;
        let addr = app.local_addr();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            addr,
            route,
            reports_rx,
            shutdown_tx,
            app_handle,
            client: reqwest::Client::new(),
        })
    }
}
