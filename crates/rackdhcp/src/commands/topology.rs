//! `topology`: which VLANs a rack serves and from which interfaces.

use std::net::IpAddr;

use rackdhcp_core::{topology, EntityId, InterfaceType, MacAddress, Snapshot, Vlan};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, TopologyArgs, TopologyCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── VLANs ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct VlanEntry {
    id: EntityId,
    vid: u16,
    name: String,
    role: &'static str,
    dhcp_on: bool,
    relay_vlan: Option<EntityId>,
    subnets: Vec<String>,
}

#[derive(Tabled)]
struct VlanRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "VID")]
    vid: u16,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "DHCP")]
    dhcp: String,
    #[tabled(rename = "Subnets")]
    subnets: String,
}

fn role(vlan: &Vlan, rack: EntityId) -> &'static str {
    if vlan.primary_rack == Some(rack) {
        "primary"
    } else if vlan.secondary_rack == Some(rack) {
        "secondary"
    } else {
        "relayed"
    }
}

fn vlan_entries(snap: &Snapshot, rack: EntityId) -> Vec<VlanEntry> {
    topology::managed_vlans(snap, rack)
        .into_iter()
        .map(|vlan| VlanEntry {
            id: vlan.id,
            vid: vlan.vid,
            name: vlan.display_name(),
            role: role(vlan, rack),
            dhcp_on: vlan.dhcp_on,
            relay_vlan: vlan.relay_vlan,
            subnets: snap
                .subnets_on_vlan(vlan.id)
                .iter()
                .map(|s| s.cidr.to_string())
                .collect(),
        })
        .collect()
}

impl From<&VlanEntry> for VlanRow {
    fn from(e: &VlanEntry) -> Self {
        let dhcp = match (e.dhcp_on, e.relay_vlan) {
            (_, Some(target)) => format!("relay -> {target}"),
            (true, None) => "on".into(),
            (false, None) => "off".into(),
        };
        Self {
            id: e.id.to_string(),
            vid: e.vid,
            name: e.name.clone(),
            role: e.role.into(),
            dhcp,
            subnets: e.subnets.join(", "),
        }
    }
}

// ── Interfaces ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct InterfaceEntry {
    id: EntityId,
    name: String,
    kind: InterfaceType,
    mac: Option<MacAddress>,
    address: Option<IpAddr>,
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Address")]
    address: String,
}

impl From<&InterfaceEntry> for InterfaceRow {
    fn from(e: &InterfaceEntry) -> Self {
        Self {
            id: e.id.to_string(),
            name: e.name.clone(),
            kind: e.kind.to_string(),
            mac: e.mac.map(|m| m.to_string()).unwrap_or_default(),
            address: e.address.map(|a| a.to_string()).unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: TopologyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = util::load_store(global)?;
    let snap = store.snapshot();

    let out = match args.command {
        TopologyCommand::Vlans { rack } => {
            let rack = util::resolve_rack(&snap, &rack)?;
            let entries = vlan_entries(&snap, rack.id);
            output::render_list(&global.output, &entries, VlanRow::from, |e| {
                e.id.to_string()
            })?
        }
        TopologyCommand::Interfaces { rack, vlan, family } => {
            let rack = util::resolve_rack(&snap, &rack)?;
            let vlan_id = EntityId::new(vlan);
            if snap.vlan(vlan_id).is_none() {
                return Err(CliError::NotFound {
                    resource_type: "vlan".into(),
                    identifier: vlan.to_string(),
                });
            }
            let version = util::version(family);
            let entries: Vec<InterfaceEntry> =
                topology::interfaces_with_ip_on_vlan(&snap, rack.id, vlan_id, version)
                    .into_iter()
                    .map(|iface| InterfaceEntry {
                        id: iface.id,
                        name: iface.name.clone(),
                        kind: iface.kind,
                        mac: iface.mac,
                        address: topology::ip_address_for_interface(
                            &snap, iface, vlan_id, version,
                        ),
                    })
                    .collect();
            output::render_list(&global.output, &entries, InterfaceRow::from, |e| {
                e.name.clone()
            })?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
