// Command handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use drsnap_config::{AppConfig, ConfigLoader};
use drsnap_core::CommandExecutor;
use drsnap_provider::AzCliClient;
use tracing::debug;

use crate::cli::{Args, Command};

pub mod create;
pub mod plan;
pub mod whoami;

/// Main command dispatcher
pub async fn execute_command(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Create {
            hosts,
            chg,
            ttl,
            exclude,
            json,
        } => {
            debug!("Handling create command");
            create::handle_create(config, hosts, chg, ttl, exclude, json).await
        }
        Command::Plan {
            hosts,
            exclude,
            json,
        } => {
            debug!("Handling plan command");
            plan::handle_plan(config, &hosts, &exclude, json)
        }
        Command::Whoami => {
            debug!("Handling whoami command");
            whoami::handle_whoami(&config).await
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = ConfigLoader::new()?.load(explicit)?;
    match &config.source_path {
        Some(path) => debug!(config = %path.display(), "Loaded configuration"),
        None => debug!("No configuration file found; using defaults"),
    }
    Ok(config)
}

/// Provider client running the configured CLI binary as a child process.
fn provider(config: &AppConfig) -> Arc<AzCliClient> {
    Arc::new(AzCliClient::new(
        CommandExecutor::process(),
        config.az_binary.clone(),
        config.retry.clone(),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    drsnap_core::snap_println!("{}", json);
    Ok(())
}
