//! Herald binary - composition root.
//!
//! 1. Parse CLI arguments
//! 2. Load configuration from TOML
//! 3. Install the tracing subscriber
//! 4. Run the requested subcommand against the built-in handlers

mod cli;

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;

use herald_action::{ExecutionContext, PluginRegistry, ProtocolEngine};
use herald_core::{HeraldConfig, HeraldError};

use cli::{CliArgs, Command};

/// Exit code for a message whose envelope was rejected.
const EXIT_PARSE_ERROR: u8 = 2;
/// Exit code for an action that failed validation.
const EXIT_INVALID: u8 = 1;
const EXIT_OK: u8 = 0;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Config is read before the main subscriber exists so its log level can
    // seed the filter; load warnings go through a warn-level bootstrap one.
    let config_file = args.resolve_config_path();
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        HeraldConfig::load_or_default(&config_file)
    });

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::debug!(path = %config_file.display(), "Configuration ready");

    match run(args.command, config, &config_file).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "herald failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: HeraldConfig, config_file: &Path) -> Result<u8, HeraldError> {
    match command {
        Command::Process {
            file,
            chat_id,
            thread_id,
        } => {
            let raw = read_input(file.as_deref())?;
            let engine = ProtocolEngine::new(Arc::new(PluginRegistry::with_builtins()), &config);
            let ctx = ExecutionContext {
                chat_id,
                thread_id,
                ..ExecutionContext::default()
            };

            match engine.process(&raw, &ctx).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(EXIT_OK)
                }
                Err(e) => {
                    eprintln!("{}", e);
                    Ok(EXIT_PARSE_ERROR)
                }
            }
        }
        Command::Validate { file } => {
            let raw = read_input(file.as_deref())?;
            let action: Value = serde_json::from_str(&raw)?;
            let report = herald_action::validate(&action);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.valid { EXIT_OK } else { EXIT_INVALID })
        }
        Command::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if save {
                config.save(config_file)?;
            }
            Ok(EXIT_OK)
        }
    }
}

/// Read a file, or stdin when no path (or `-`) is given.
fn read_input(path: Option<&Path>) -> Result<String, HeraldError> {
    match path {
        Some(p) if p != Path::new("-") => Ok(std::fs::read_to_string(p)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"actions":[]}}"#).unwrap();
        assert_eq!(read_input(Some(file.path())).unwrap(), r#"{"actions":[]}"#);
    }

    #[tokio::test]
    async fn test_validate_exit_codes() {
        let mut valid = tempfile::NamedTempFile::new().unwrap();
        write!(valid, r#"{{"type":"event","payload":{{"name":"ping"}}}}"#).unwrap();
        let code = run(
            Command::Validate {
                file: Some(valid.path().to_path_buf()),
            },
            HeraldConfig::default(),
            Path::new("unused.toml"),
        )
        .await
        .unwrap();
        assert_eq!(code, EXIT_OK);

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        write!(invalid, r#"{{"type":"memory","payload":{{"content":"note","tags":[1,2]}}}}"#).unwrap();
        let code = run(
            Command::Validate {
                file: Some(invalid.path().to_path_buf()),
            },
            HeraldConfig::default(),
            Path::new("unused.toml"),
        )
        .await
        .unwrap();
        assert_eq!(code, EXIT_INVALID);
    }

    #[tokio::test]
    async fn test_config_save_writes_effective_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald").join("config.toml");
        let mut config = HeraldConfig::default();
        config.retry.max_attempts = 4;

        let code = run(Command::Config { save: true }, config, &path).await.unwrap();
        assert_eq!(code, EXIT_OK);
        assert_eq!(HeraldConfig::load_or_default(&path).retry.max_attempts, 4);
    }

    #[tokio::test]
    async fn test_process_parse_error_exit_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not-json").unwrap();
        let code = run(
            Command::Process {
                file: Some(file.path().to_path_buf()),
                chat_id: None,
                thread_id: None,
            },
            HeraldConfig::default(),
            Path::new("unused.toml"),
        )
        .await
        .unwrap();
        assert_eq!(code, EXIT_PARSE_ERROR);
    }
}
