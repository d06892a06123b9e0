//! Core domain types and service traits for the alert handler
//!
//! This module defines the webhook payload types, the configured handler
//! descriptor, and the trait contract for running external scripts.

use crate::script::ScriptError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The label used to match an alert against the handler table.
pub const SUMMARY_LABEL: &str = "summary";

/// The body of one webhook request.
///
/// Additional top-level fields sent by Alertmanager (`receiver`,
/// `groupLabels`, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Notification {
    pub alerts: Vec<Alert>,
}

/// A single alert as sent by Alertmanager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Alert {
    /// "firing" or "resolved"
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Alert {
    /// Returns the `summary` label, or an empty string when it is missing.
    pub fn summary(&self) -> &str {
        self.labels
            .get(SUMMARY_LABEL)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// A handler as defined in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AlertHandler {
    pub name: String,
    pub summary: String,
    pub status: String,
    /// Script path relative to the script directory.
    #[serde(rename = "script-name")]
    pub script_name: String,
    /// Selects the interpreter, e.g. "bash" or "python2".
    #[serde(rename = "script-type")]
    pub script_type: String,
    /// Passed verbatim to the script after its path.
    pub args: Vec<String>,
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The interpreter executable.
    pub program: String,
    /// The script path followed by the configured arguments.
    pub args: Vec<String>,
}

impl Invocation {
    /// The script path, which is always the first argument.
    pub fn script_path(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Runs an external script and waits for it to exit
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Executes `invocation` to completion.
    ///
    /// # Returns
    /// * `Ok(String)` with the combined stdout and stderr on a zero exit status
    /// * `Err` if the process could not be spawned or exited unsuccessfully
    async fn run(&self, invocation: &Invocation) -> Result<String, ScriptError>;
}
