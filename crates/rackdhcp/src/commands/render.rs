//! `render`: print the synthesized configuration for one rack.

use std::fmt::Write;

use rackdhcp_core::assembler::{self, DhcpConfiguration, FamilyConfig};
use rackdhcp_core::IpVersion;
use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat, RenderArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Shared network")]
    name: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "MTU")]
    mtu: u32,
    #[tabled(rename = "Subnets")]
    subnets: String,
    #[tabled(rename = "Pools")]
    pools: usize,
    #[tabled(rename = "Failover")]
    failover: String,
}

fn rows(version: IpVersion, family: &FamilyConfig) -> Vec<NetworkRow> {
    family
        .shared_networks
        .iter()
        .map(|net| {
            let failover = net
                .subnets
                .iter()
                .flat_map(|s| &s.pools)
                .find_map(|p| p.failover_peer.clone())
                .unwrap_or_default();
            NetworkRow {
                family: version.to_string(),
                name: net.name.clone(),
                interface: net.interface.clone().unwrap_or_default(),
                mtu: net.mtu,
                subnets: net
                    .subnets
                    .iter()
                    .map(|s| s.subnet_cidr.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                pools: net.subnets.iter().map(|s| s.pools.len()).sum(),
                failover,
            }
        })
        .collect()
}

fn detail(config: &DhcpConfiguration, versions: &[IpVersion]) -> String {
    let table: Vec<NetworkRow> = versions
        .iter()
        .flat_map(|v| rows(*v, config.family(*v)))
        .collect();

    let mut out = if table.is_empty() {
        "No shared networks.".to_owned()
    } else {
        output::render_table(&table)
    };
    for version in versions {
        let family = config.family(*version);
        let _ = write!(
            out,
            "\n{version}: {} host reservation(s), {} failover peer(s), interfaces [{}]",
            family.hosts.len(),
            family.failover_peers.len(),
            family
                .interfaces
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    let _ = write!(
        out,
        "\nGlobal snippets: {}",
        config.global_dhcp_snippets.len()
    );
    out
}

fn shared_network_names(config: &DhcpConfiguration, versions: &[IpVersion]) -> String {
    versions
        .iter()
        .flat_map(|v| config.family(*v).shared_networks.iter())
        .map(|n| n.name.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_structured(format: &OutputFormat) -> bool {
    matches!(
        format,
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &RenderArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = util::load_store(global)?;
    let cfg = util::load_config()?;
    let settings = util::engine_settings(&cfg, global)?;
    let snap = store.snapshot();
    let rack = util::resolve_rack(&snap, &args.rack)?;

    let config = assembler::get_dhcp_configuration(&snap, rack.id, &settings, store.omapi_key())?;
    let versions: Vec<IpVersion> = match args.family {
        Some(f) => vec![util::version(f)],
        None => vec![IpVersion::V4, IpVersion::V6],
    };

    let out = match args.family {
        // A single family in a structured format prints just that family.
        Some(f) if is_structured(&global.output) => output::render_single(
            &global.output,
            config.family(util::version(f)),
            |_| String::new(),
            |_| String::new(),
        )?,
        _ => output::render_single(
            &global.output,
            &config,
            |c| detail(c, &versions),
            |c| shared_network_names(c, &versions),
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
