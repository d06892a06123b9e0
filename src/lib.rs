/// Alert Handler - runs scripts in response to Alertmanager webhooks
///
/// This library provides the dispatch pipeline: webhook ingestion, matching
/// alerts against configured handlers, and rate-limited script execution.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod handlers;
pub mod internal_metrics;
pub mod rate_limiter;
pub mod reporter;
pub mod script;
pub mod server;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
