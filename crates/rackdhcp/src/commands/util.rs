//! Shared helpers for command handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rackdhcp_api::RackClient;
use rackdhcp_config::Config;
use rackdhcp_core::{
    DataStore, DhcpEngine, EngineSettings, EntityId, Inventory, IpVersion, Node, RackPool,
    Snapshot,
};
use tracing::debug;

use crate::cli::{Family, GlobalOpts};
use crate::error::CliError;

/// Load the inventory named by `--inventory` into a fresh store.
pub fn load_store(global: &GlobalOpts) -> Result<Arc<DataStore>, CliError> {
    let path = global.inventory.as_deref().ok_or(CliError::NoInventory)?;
    let inventory = Inventory::load(path)?;
    Ok(Arc::new(DataStore::from_inventory(inventory)?))
}

/// Load the config file layered with `RACKDHCP_*` env vars.
pub fn load_config() -> Result<Config, CliError> {
    Ok(rackdhcp_config::load_config()?)
}

/// Engine settings from config, with `--timeout` applied.
pub fn engine_settings(cfg: &Config, global: &GlobalOpts) -> Result<EngineSettings, CliError> {
    let mut settings = cfg.to_engine_settings()?;
    if let Some(secs) = global.timeout {
        settings.rpc_timeout = timeout(secs)?;
    }
    Ok(settings)
}

fn timeout(secs: u64) -> Result<Duration, CliError> {
    if secs == 0 {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Resolve a rack controller by hostname or id.
pub fn resolve_rack(snap: &Snapshot, identifier: &str) -> Result<Arc<Node>, CliError> {
    snap.find_node(identifier)
        .filter(|n| n.node_type.is_rack())
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            resource_type: "rack".into(),
            identifier: identifier.into(),
        })
}

pub fn version(family: Family) -> IpVersion {
    match family {
        Family::V4 => IpVersion::V4,
        Family::V6 => IpVersion::V6,
    }
}

/// Build clients for every inventory rack with a `[racks.<hostname>]`
/// entry (or just `only`), then probe them.
pub async fn connect_racks(
    cfg: &Config,
    snap: &Snapshot,
    global: &GlobalOpts,
    only: Option<EntityId>,
) -> Result<RackPool, CliError> {
    let pool = RackPool::new();
    for rack in snap.racks() {
        if only.is_some_and(|id| id != rack.id) {
            continue;
        }
        if cfg.rack(&rack.hostname).is_none() {
            debug!(rack = %rack.hostname, "no endpoint configured");
            continue;
        }
        let mut endpoint = cfg.rack_endpoint(&rack.hostname)?;
        if let Some(secs) = global.timeout {
            endpoint.transport.timeout = timeout(secs)?;
        }
        let client = RackClient::new(endpoint.url, endpoint.token, &endpoint.transport)?;
        pool.insert(rack.id, client);
    }

    let connected = pool.probe().await;
    debug!(
        configured = pool.len(),
        connected = connected.len(),
        "probed racks"
    );
    Ok(pool)
}

/// Engine over `store` talking to `pool`.
pub fn engine(
    store: Arc<DataStore>,
    pool: RackPool,
    settings: EngineSettings,
) -> DhcpEngine<RackPool> {
    DhcpEngine::new(store, Arc::new(pool), settings)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read a YAML or JSON document (JSON by `.json` extension).
pub fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(serde_yaml::from_str(&contents)?)
    }
}
