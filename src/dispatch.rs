//! Matches alerts to handlers and runs their scripts.

use crate::{
    core::{Alert, Invocation, ScriptRunner},
    handlers::HandlerTable,
    rate_limiter::RateLimiter,
    reporter::DispatchReport,
    script::{Interpreter, ScriptError},
};
use async_channel::Sender;
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no handler found for this alert: {0}")]
    NoHandler(String),

    #[error("handler for alert {summary} is misconfigured: {source}")]
    Configuration {
        summary: String,
        #[source]
        source: ScriptError,
    },

    #[error("script {script} failed for alert {summary}: {source}")]
    Execution {
        summary: String,
        script: String,
        #[source]
        source: ScriptError,
    },
}

impl DispatchError {
    /// A short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoHandler(_) => "no_handler",
            DispatchError::Configuration { .. } => "configuration",
            DispatchError::Execution { .. } => "execution",
        }
    }

    /// Output captured from a script that ran and failed.
    pub fn output(&self) -> Option<&str> {
        match self {
            DispatchError::Execution { source, .. } => source.output(),
            _ => None,
        }
    }
}

/// The result of a script that ran to a zero exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub invocation: Invocation,
    pub output: String,
}

/// Runs the matching handler script for one alert at a time.
///
/// Holds no per-alert state; every call to [`Dispatcher::dispatch`] is
/// independent, and the only shared pieces are the read-only handler table
/// and the rate limiter.
pub struct Dispatcher {
    handlers: Arc<HandlerTable>,
    script_directory: PathBuf,
    rate_limiter: Arc<RateLimiter>,
    runner: Arc<dyn ScriptRunner>,
}

impl Dispatcher {
    pub fn new(
        handlers: Arc<HandlerTable>,
        script_directory: PathBuf,
        rate_limiter: Arc<RateLimiter>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self {
            handlers,
            script_directory,
            rate_limiter,
            runner,
        }
    }

    /// Looks up the handler for `alert` and builds the process invocation
    /// without running anything.
    pub fn resolve(&self, alert: &Alert) -> Result<Invocation, DispatchError> {
        let summary = alert.summary();
        let handler = self
            .handlers
            .lookup(summary)
            .ok_or_else(|| DispatchError::NoHandler(summary.to_string()))?;

        let interpreter = Interpreter::from_script_type(&handler.script_type).map_err(|source| {
            DispatchError::Configuration {
                summary: summary.to_string(),
                source,
            }
        })?;

        let path = script_path(&self.script_directory, &handler.script_name);
        let mut args = Vec::with_capacity(handler.args.len() + 1);
        args.push(path.to_string_lossy().into_owned());
        args.extend(handler.args.iter().cloned());

        Ok(Invocation {
            program: interpreter.program().to_string(),
            args,
        })
    }

    /// Runs the handler script for `alert`, waiting for a rate limit token
    /// first. Failures are logged here and returned; nothing is retried.
    #[instrument(skip_all, fields(summary = %alert.summary(), status = %alert.status))]
    pub async fn dispatch(&self, alert: &Alert) -> Result<DispatchOutcome, DispatchError> {
        let invocation = match self.resolve(alert) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("{}", e);
                return Err(e);
            }
        };

        self.rate_limiter.acquire().await;

        info!(
            "Firing script {} to deal with alert {}",
            invocation.script_path(),
            alert.summary()
        );
        match self.runner.run(&invocation).await {
            Ok(output) => {
                debug!(%output, "Script completed");
                Ok(DispatchOutcome { invocation, output })
            }
            Err(source) => {
                let e = DispatchError::Execution {
                    summary: alert.summary().to_string(),
                    script: invocation.script_path().to_string(),
                    source,
                };
                error!(output = e.output().unwrap_or_default(), "{}", e);
                Err(e)
            }
        }
    }

    /// Dispatches `alert` on its own task and sends the result to `reports`
    /// once it finishes. The caller is not expected to await the handle.
    pub fn spawn(self: &Arc<Self>, alert: Alert, reports: Sender<DispatchReport>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let result = dispatcher.dispatch(&alert).await;
            let report = DispatchReport {
                summary: alert.summary().to_string(),
                result,
            };
            if reports.send(report).await.is_err() {
                debug!("Report channel closed, dropping dispatch report");
            }
        })
    }
}

/// Prefixes `script_name` with the script directory. A leading root or
/// drive prefix on the name is dropped, so the result always starts with
/// `script_directory`.
fn script_path(script_directory: &Path, script_name: &str) -> PathBuf {
    let relative: PathBuf = Path::new(script_name)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    script_directory.join(relative)
}
