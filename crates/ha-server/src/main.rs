//! Home Assistant Alexa bridge
//!
//! Operator entry point: lists the hub's entities joined with their device
//! and area, and publishes the Alexa entity allowlist into
//! configuration.yaml. Results are printed to stdout as JSON, logs go to
//! stderr (`RUST_LOG`, default `info`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ha_config::AlexaConfigMutator;
use ha_ws_client::{
    AddonOptionsProvider, CredentialProvider, SyncEngine, SyncHandle, SyncSnapshot, WsConnector,
};

#[derive(Debug, Parser)]
#[command(
    name = "ha-alexa-bridge",
    version,
    about = "Pick Home Assistant entities to expose to Alexa"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync the registries once and print the compiled entities
    Entities {
        /// Seconds to wait for the first join
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Print the allowlist currently published in configuration.yaml
    Allowlist,
    /// Replace the published allowlist
    Publish {
        /// Entity ids (`domain.slug`); none clears the list
        entity_ids: Vec<String>,
    },
    /// Print the resolved access token and websocket URL
    Connection,
    /// Stay connected and log every join until interrupted
    Watch {
        /// Re-query the registries every N seconds
        #[arg(long, value_name = "SECS")]
        reload_every: Option<u64>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn failure(key: &str, message: impl ToString) -> Value {
    json!({ "success": false, key: message.to_string() })
}

fn entities_envelope(snapshot: &SyncSnapshot) -> Value {
    json!({ "success": true, "data": snapshot.entities.as_slice() })
}

fn allowlist_envelope(entity_ids: &[String]) -> Value {
    json!({ "success": true, "entityIds": entity_ids })
}

/// Allowlist used for the `shared` flag; unreadable config means nothing is shared
fn published_allowlist(mutator: &AlexaConfigMutator) -> HashSet<String> {
    match mutator.current_allowlist() {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            warn!("Could not read published allowlist: {}", e);
            HashSet::new()
        }
    }
}

fn start_engine(mutator: &AlexaConfigMutator) -> SyncHandle {
    SyncEngine::spawn(
        Arc::new(AddonOptionsProvider::from_env()),
        Arc::new(WsConnector::default()),
        published_allowlist(mutator),
    )
}

async fn list_entities(mutator: &AlexaConfigMutator, wait: Duration) -> Result<bool> {
    let handle = start_engine(mutator);

    let outcome = tokio::time::timeout(wait, handle.wait_until_ready()).await;
    handle.close().await;

    let response = match outcome {
        Ok(Ok(snapshot)) => entities_envelope(&snapshot),
        Ok(Err(e)) => failure("message", e),
        Err(_) => failure("message", "Timed out waiting for Home Assistant registries"),
    };
    let success = response["success"] == true;
    print_json(&response)?;
    Ok(success)
}

fn show_allowlist(mutator: &AlexaConfigMutator) -> Result<bool> {
    match mutator.current_allowlist() {
        Ok(entity_ids) => {
            print_json(&allowlist_envelope(&entity_ids))?;
            Ok(true)
        }
        Err(e) => {
            print_json(&failure("error", e))?;
            Ok(false)
        }
    }
}

fn publish(mutator: &AlexaConfigMutator, entity_ids: &[String]) -> Result<bool> {
    match mutator.update_alexa_configuration(entity_ids) {
        Ok(outcome) => {
            print_json(&outcome)?;
            Ok(true)
        }
        Err(e) => {
            warn!(stage = %e.stage(), "Publish failed: {}", e);
            print_json(&failure("error", e))?;
            Ok(false)
        }
    }
}

async fn show_connection() -> Result<bool> {
    match AddonOptionsProvider::from_env().connection_config().await {
        Ok(config) => {
            let mut response = serde_json::to_value(&config)?;
            response["success"] = json!(true);
            print_json(&response)?;
            Ok(true)
        }
        Err(e) => {
            print_json(&failure("error", e))?;
            Ok(false)
        }
    }
}

fn log_snapshot(snapshot: &SyncSnapshot) {
    let shared = snapshot.entities.iter().filter(|e| e.shared).count();
    info!(
        state = %snapshot.state,
        connected = snapshot.connected,
        generation = snapshot.generation,
        entities = snapshot.entities.len(),
        shared,
        error = snapshot.error.as_deref().unwrap_or(""),
        "Registry snapshot"
    );
}

async fn watch(mutator: &AlexaConfigMutator, reload_every: Option<u64>) -> Result<bool> {
    let handle = start_engine(mutator);
    let mut updates = handle.subscribe();
    let mut ticker = reload_every.map(|secs| tokio::time::interval(Duration::from_secs(secs.max(1))));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                log_snapshot(&snapshot);
                if snapshot.state.is_terminal() || (!snapshot.connected && snapshot.error.is_some()) {
                    break;
                }
            }
            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => ticker.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Err(e) = handle.reload().await {
                    warn!("Reload skipped: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing connection");
                break;
            }
        }
    }

    let last = handle.snapshot();
    handle.close().await;
    Ok(last.error.is_none())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let mutator = AlexaConfigMutator::from_env();

    let success = match cli.command {
        Command::Entities { timeout } => {
            list_entities(&mutator, Duration::from_secs(timeout)).await?
        }
        Command::Allowlist => show_allowlist(&mutator)?,
        Command::Publish { entity_ids } => publish(&mutator, &entity_ids)
            .with_context(|| format!("publishing {} entities", entity_ids.len()))?,
        Command::Connection => show_connection().await?,
        Command::Watch { reload_every } => watch(&mutator, reload_every).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
