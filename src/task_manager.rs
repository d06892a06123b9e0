//! Tracks the long-running background services of the application.
//!
//! Per-alert dispatch tasks are deliberately not tracked here; they are
//! short-lived, fire-and-forget, and report through the dispatch reporter.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Spawns named service tasks and awaits them all on shutdown.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    /// Spawns `future` and remembers its handle under `name`.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(service = name, "Starting service task");
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name, handle));
    }

    /// A fresh receiver for the application-wide shutdown signal.
    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Waits for every service task to finish and returns how many of them
    /// panicked.
    pub async fn shutdown(self) -> usize {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        info!("Waiting for {} service tasks to stop...", handles.len());

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut panicked = 0;
        for (service, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(service, "Service stopped."),
                Err(e) => {
                    error!(service, error = %e, "Service task panicked.");
                    panicked += 1;
                }
            }
        }

        if panicked == 0 {
            info!("All service tasks stopped.");
        }
        panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_waits_for_services_and_counts_panics() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = TaskManager::new(shutdown_rx);

        let mut rx = manager.shutdown_rx();
        manager.spawn("waits-for-signal", async move {
            let _ = rx.changed().await;
        });
        manager.spawn("panics", async { panic!("boom") });

        shutdown_tx.send(true).unwrap();
        assert_eq!(manager.shutdown().await, 1);
    }
}
