//! The webhook ingestion endpoint.
//!
//! A single route accepts Alertmanager notifications over POST. Every alert
//! in a notification is dispatched on its own task and the response is sent
//! without waiting for any of them. The caller only ever learns about a
//! wrong method (405); everything else is reported through logs.

use crate::{
    config::ServerConfig,
    core::Notification,
    dispatch::Dispatcher,
    internal_metrics::Metrics,
    reporter::DispatchReport,
};
use async_channel::Sender;
use axum::{
    body::{to_bytes, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    routing::any,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Wrong HTTP method: {0}")]
    Method(Method),

    #[error("Read error: {0}")]
    Body(#[source] axum::Error),

    #[error("Json error: {0}")]
    Decode(#[source] serde_json::Error),
}

impl IngestError {
    /// The status written back to the webhook caller.
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Method(_) => StatusCode::METHOD_NOT_ALLOWED,
            // The webhook contract is fire-and-forget; nothing beyond the
            // default status is reported for unreadable payloads.
            IngestError::Body(_) | IngestError::Decode(_) => StatusCode::OK,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            IngestError::Method(_) => "method",
            IngestError::Body(_) => "body",
            IngestError::Decode(_) => "decode",
        }
    }
}

/// Shared state handed to the webhook handler.
#[derive(Clone)]
pub struct IngestState {
    pub dispatcher: Arc<Dispatcher>,
    pub reports: Sender<DispatchReport>,
    pub metrics: Arc<Metrics>,
}

/// Builds the router serving the webhook on `path`.
pub fn router(path: &str, state: IngestState, timeouts: &ServerConfig) -> Router {
    Router::new()
        .route(path, any(receive_notification))
        .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(
            timeouts.read_timeout_seconds,
        )))
        .layer(TimeoutLayer::new(Duration::from_secs(
            timeouts.write_timeout_seconds,
        )))
        .with_state(state)
}

#[instrument(skip_all, fields(method = %request.method()))]
async fn receive_notification(State(state): State<IngestState>, request: Request) -> StatusCode {
    state.metrics.requests_total.increment(1);

    let notification = match read_notification(request).await {
        Ok(notification) => notification,
        Err(e) => {
            match &e {
                IngestError::Method(_) => warn!("{}", e),
                _ => error!("{}", e),
            }
            state.metrics.increment_rejected(e.reason());
            return e.status();
        }
    };

    debug!(count = notification.alerts.len(), "Received notification");
    state
        .metrics
        .alerts_received_total
        .increment(notification.alerts.len() as u64);
    for alert in notification.alerts {
        state.dispatcher.spawn(alert, state.reports.clone());
    }
    StatusCode::OK
}

/// Checks the method, then reads and decodes the whole body.
async fn read_notification(request: Request) -> Result<Notification, IngestError> {
    if *request.method() != Method::POST {
        return Err(IngestError::Method(request.method().clone()));
    }
    let body: Bytes = to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(IngestError::Body)?;
    serde_json::from_slice(&body).map_err(IngestError::Decode)
}

/// Serves the webhook router until shutdown.
///
/// Connections that do not deliver a request head within the idle timeout
/// are closed, including keep-alive connections between requests.
pub struct IngestServer {
    listener: TcpListener,
    router: Router,
    idle_timeout: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl IngestServer {
    pub fn new(
        listener: TcpListener,
        router: Router,
        idle_timeout: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            router,
            idle_timeout,
            shutdown_rx,
        }
    }

    /// Returns a future that serves until the shutdown signal is received.
    /// In-flight requests are allowed to finish.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            router,
            idle_timeout,
            mut shutdown_rx,
        } = self;
        async move {
            let mut builder = auto::Builder::new(TokioExecutor::new());
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(idle_timeout);
            let graceful = GracefulShutdown::new();

            loop {
                let (stream, peer) = tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Webhook server failed to accept a connection: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    },
                    _ = shutdown_rx.changed() => {
                        info!("Webhook server received shutdown signal.");
                        break;
                    }
                };

                let service = TowerToHyperService::new(router.clone());
                let connection = builder
                    .serve_connection(TokioIo::new(stream), service)
                    .into_owned();
                let connection = graceful.watch(connection);
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!(%peer, "Connection closed: {}", e);
                    }
                });
            }

            drop(listener);
            graceful.shutdown().await;
            debug!("Webhook server task finished.");
        }
    }
}
