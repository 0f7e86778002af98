//! CLI argument definitions for the herald binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Herald: run action messages through the protocol engine.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Process one wire message and print the JSON report.
    Process {
        /// File holding the message. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,

        /// Chat the message arrived in.
        #[arg(long = "chat-id")]
        chat_id: Option<i64>,

        /// Thread within the chat.
        #[arg(long = "thread-id", requires = "chat_id")]
        thread_id: Option<i64>,
    },
    /// Validate one `{type, payload}` action and print the errors.
    Validate {
        /// File holding the action. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// Also write it to the resolved config path.
        #[arg(long)]
        save: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HERALD_CONFIG env var > ~/.herald/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HERALD_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the tracing filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value > info.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        let env = std::env::var("RUST_LOG").ok();
        pick_log_filter(self.log_level.as_deref(), env.as_deref(), config_level)
    }
}

fn pick_log_filter(flag: Option<&str>, env: Option<&str>, config_level: &str) -> String {
    [flag, env, Some(config_level)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|level| !level.is_empty())
        .unwrap_or("info")
        .to_string()
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".herald").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".herald").join("config.toml");
    }
    PathBuf::from("config.toml")
}
