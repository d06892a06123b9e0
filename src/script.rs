//! Script interpreters and the process-backed `ScriptRunner`.

use crate::core::{Invocation, ScriptRunner};
use async_trait::async_trait;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("no handler information for script of this type: {0}")]
    UnknownScriptType(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        /// Combined stdout and stderr of the process.
        output: String,
    },
}

impl ScriptError {
    /// The captured output, if the process got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ScriptError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// The interpreters a handler may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    Python,
    Bash,
}

impl Interpreter {
    /// Maps a configured `script-type` onto an interpreter. Unknown types are
    /// an error; nothing falls back to a default interpreter.
    pub fn from_script_type(script_type: &str) -> Result<Self, ScriptError> {
        match script_type {
            "python2" => Ok(Interpreter::Python),
            "bash" => Ok(Interpreter::Bash),
            other => Err(ScriptError::UnknownScriptType(other.to_string())),
        }
    }

    /// The executable name looked up on `PATH`.
    pub fn program(&self) -> &'static str {
        match self {
            Interpreter::Python => "python",
            Interpreter::Bash => "bash",
        }
    }
}

/// Runs scripts as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    #[instrument(skip_all, fields(invocation = %invocation))]
    async fn run(&self, invocation: &Invocation) -> Result<String, ScriptError> {
        let out = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .await
            .map_err(|source| ScriptError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        debug!(status = %out.status, bytes = output.len(), "Script exited");

        if out.status.success() {
            Ok(output)
        } else {
            Err(ScriptError::Failed {
                program: invocation.program.clone(),
                status: out.status,
                output,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_script_types_map_to_interpreters() {
        assert_eq!(
            Interpreter::from_script_type("python2").unwrap().program(),
            "python"
        );
        assert_eq!(Interpreter::from_script_type("bash").unwrap().program(), "bash");
    }

    #[test]
    fn unknown_script_type_fails_closed() {
        let err = Interpreter::from_script_type("ruby").unwrap_err();
        assert!(matches!(err, ScriptError::UnknownScriptType(ref t) if t == "ruby"));
        assert!(err
            .to_string()
            .starts_with("no handler information for script of this type"));

        // Matching is exact.
        assert!(Interpreter::from_script_type("Bash").is_err());
        assert!(Interpreter::from_script_type("").is_err());
    }
}
