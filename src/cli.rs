//! Command-Line Interface (CLI) argument parsing.
//!
//! These arguments are parsed at startup and merged on top of the JSON
//! configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Long flags that are also accepted with a single leading dash.
const SINGLE_DASH_FLAGS: [&str; 2] = ["configPath", "scriptPath"];

/// Runs scripts in response to Alertmanager webhook notifications.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file. `-configPath` is also accepted.
    /// [default: ~/.alert-handler/alert-handler-config.json]
    #[arg(long = "configPath", visible_alias = "config-path", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Directory containing the handler scripts. `-scriptPath` is also accepted.
    /// [default: ~/.alert-handler/scripts/]
    #[arg(long = "scriptPath", visible_alias = "script-path", value_name = "DIR")]
    pub script_path: Option<PathBuf>,
}

impl Cli {
    /// Parses the process arguments.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrites `-configPath` / `-scriptPath` (with or without `=value`) to
/// their double-dash form. Everything else passes through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let rewritten = arg
                .to_str()
                .and_then(|s| s.strip_prefix('-'))
                .filter(|rest| {
                    let name = rest.split('=').next().unwrap_or_default();
                    SINGLE_DASH_FLAGS.contains(&name)
                })
                .map(|rest| OsString::from(format!("--{}", rest)));
            rewritten.unwrap_or(arg)
        })
        .collect()
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(dir) = &self.script_path {
            dict.insert(
                "script-directory".into(),
                Value::from(dir.to_string_lossy().into_owned()),
            );
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
