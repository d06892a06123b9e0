//! Collects the results of finished dispatches.
//!
//! Dispatch tasks are fire-and-forget from the HTTP handler's point of view.
//! Each one sends a [`DispatchReport`] here when it finishes; the reporter
//! counts it and optionally forwards it to an observer. Reports never reach
//! the webhook caller.

use crate::{
    dispatch::{DispatchError, DispatchOutcome},
    internal_metrics::Metrics,
};
use async_channel::{Receiver, Sender};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace};

/// The completion record of one dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    /// The `summary` label of the alert.
    pub summary: String,
    pub result: Result<DispatchOutcome, DispatchError>,
}

impl DispatchReport {
    /// A short label for the outcome, used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match &self.result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        }
    }
}

/// Consumes reports until shutdown or until every sender is gone.
#[instrument(skip_all)]
pub async fn run_reporter(
    mut shutdown_rx: watch::Receiver<bool>,
    reports_rx: Receiver<DispatchReport>,
    observer: Option<Sender<DispatchReport>>,
    metrics: Arc<Metrics>,
) {
    debug!("Dispatch reporter started.");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                info!("Dispatch reporter received shutdown signal.");
                break;
            }
            report = reports_rx.recv() => {
                let Ok(report) = report else {
                    break;
                };
                let outcome = report.outcome();
                trace!(summary = %report.summary, outcome, "Dispatch finished");
                metrics.increment_dispatch(outcome);

                if let Some(observer) = &observer {
                    if observer.send(report).await.is_err() {
                        debug!("Dispatch report observer went away.");
                    }
                }
            }
        }
    }
    debug!("Dispatch reporter finished.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Invocation;

    #[tokio::test]
    async fn forwards_reports_to_observer() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (reports_tx, reports_rx) = async_channel::unbounded();
        let (observer_tx, observer_rx) = async_channel::unbounded();
        let task = tokio::spawn(run_reporter(
            shutdown_rx,
            reports_rx,
            Some(observer_tx),
            Arc::new(Metrics::new()),
        ));

        reports_tx
            .send(DispatchReport {
                summary: "DiskFull".to_string(),
                result: Ok(DispatchOutcome {
                    invocation: Invocation {
                        program: "bash".to_string(),
                        args: vec!["/scripts/clean.sh".to_string()],
                    },
                    output: String::new(),
                }),
            })
            .await
            .unwrap();
        reports_tx
            .send(DispatchReport {
                summary: "Unknown".to_string(),
                result: Err(DispatchError::NoHandler("Unknown".to_string())),
            })
            .await
            .unwrap();

        let first = observer_rx.recv().await.unwrap();
        let second = observer_rx.recv().await.unwrap();
        assert_eq!(first.outcome(), "success");
        assert_eq!(second.outcome(), "no_handler");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
