//! `apply`: push configuration to one rack and report service health.

use rackdhcp_core::{IpVersion, ServiceHealth};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthEntry {
    rack: String,
    #[serde(flatten)]
    health: ServiceHealth,
}

#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Rack")]
    rack: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Info")]
    info: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = util::load_store(global)?;
    let cfg = util::load_config()?;
    let settings = util::engine_settings(&cfg, global)?;
    let snap = store.snapshot();
    let rack = util::resolve_rack(&snap, &args.rack)?;

    if cfg.rack(&rack.hostname).is_none() {
        return Err(CliError::RackNotConfigured {
            name: rack.hostname.clone(),
            path: rackdhcp_config::config_path().display().to_string(),
        });
    }
    if !util::confirm(
        &format!("Push DHCP configuration to rack '{}'?", rack.hostname),
        global.yes,
    )? {
        return Ok(());
    }

    let pool = util::connect_racks(&cfg, &snap, global, Some(rack.id)).await?;
    let engine = util::engine(store, pool, settings);
    let result = engine.configure_dhcp(rack.id).await;

    let entries: Vec<HealthEntry> = [IpVersion::V4, IpVersion::V6]
        .into_iter()
        .map(|v| HealthEntry {
            rack: rack.hostname.clone(),
            health: engine.store().service_health(rack.id, v),
        })
        .collect();
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &entries,
        |e| HealthRow {
            rack: e.rack.clone(),
            family: e.health.version.to_string(),
            status: output::status_label(e.health.status, color),
            info: e.health.status_info.clone(),
        },
        |e| format!("{} {}", e.health.version, e.health.status),
    )?;
    output::print_output(&out, global.quiet);

    result?;
    if !global.quiet {
        eprintln!("Configuration applied to {}", rack.hostname);
    }
    Ok(())
}
