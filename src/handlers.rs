//! The table of configured alert handlers.

use crate::core::AlertHandler;
use std::collections::HashMap;
use tracing::warn;

/// Maps an alert summary to the handler that deals with it.
///
/// Built once at startup and never mutated, so it can be shared behind an
/// `Arc` and read from any number of dispatch tasks without locking.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, AlertHandler>,
}

impl HandlerTable {
    /// Builds the table from the `alerts` section of the configuration.
    ///
    /// Entries are keyed by their map key. A handler whose own `summary`
    /// field disagrees with its key is kept, but the mismatch is logged.
    pub fn new(handlers: HashMap<String, AlertHandler>) -> Self {
        for (summary, handler) in &handlers {
            if !handler.summary.is_empty() && handler.summary != *summary {
                warn!(
                    key = %summary,
                    summary = %handler.summary,
                    "Handler summary does not match its key; matching on the key"
                );
            }
        }
        Self { handlers }
    }

    /// Exact-match lookup by alert summary.
    pub fn lookup(&self, summary: &str) -> Option<&AlertHandler> {
        self.handlers.get(summary)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(summary: &str, script: &str) -> AlertHandler {
        AlertHandler {
            name: format!("{} handler", summary),
            summary: summary.to_string(),
            script_name: script.to_string(),
            script_type: "bash".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_is_exact_match() {
        let mut map = HashMap::new();
        map.insert("DiskFull".to_string(), handler("DiskFull", "clean.sh"));
        let table = HandlerTable::new(map);

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("DiskFull").unwrap().script_name, "clean.sh");
        assert!(table.lookup("diskfull").is_none());
        assert!(table.lookup("DiskFul").is_none());
        assert!(table.lookup("").is_none());
    }

    #[test]
    fn mismatched_summary_is_keyed_by_map_key() {
        let mut map = HashMap::new();
        map.insert("HighLoad".to_string(), handler("SomethingElse", "load.sh"));
        let table = HandlerTable::new(map);

        assert!(table.lookup("HighLoad").is_some());
        assert!(table.lookup("SomethingElse").is_none());
    }
}
