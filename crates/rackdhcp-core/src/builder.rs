// ── Subnet and host fragment builder ──
//
// Turns inventory rows into the per-subnet and per-host pieces of the
// document a rack consumes. Pure functions over a `Snapshot`.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use rackdhcp_api::{HostEntry, Pool, Snippet, SubnetConfig};

use crate::model::{EntityId, Interface, InterfaceType, MacAddress, SnippetScope, Subnet};
use crate::settings::EngineSettings;
use crate::store::Snapshot;
use crate::topology;

// ── Snippets ─────────────────────────────────────────────────────────

fn snippets_in_scope(snap: &Snapshot, scope: SnippetScope) -> Vec<Snippet> {
    snap.snippets()
        .iter()
        .filter(|s| s.enabled && s.scope == scope)
        .map(|s| s.render())
        .collect()
}

/// Enabled snippets with neither subnet nor node scope.
pub fn global_snippets(snap: &Snapshot) -> Vec<Snippet> {
    snippets_in_scope(snap, SnippetScope::Global)
}

pub fn subnet_snippets(snap: &Snapshot, subnet_id: EntityId) -> Vec<Snippet> {
    snippets_in_scope(snap, SnippetScope::Subnet { subnet_id })
}

pub fn node_snippets(snap: &Snapshot, node_id: EntityId) -> Vec<Snippet> {
    snippets_in_scope(snap, SnippetScope::Node { node_id })
}

// ── Subnet fragment ──────────────────────────────────────────────────

/// Inputs resolved by the caller for one subnet fragment.
#[derive(Debug, Clone, Copy)]
pub struct SubnetContext<'a> {
    pub rack: EntityId,
    pub settings: &'a EngineSettings,
    pub ntp_servers: &'a [String],
    /// Name of the failover relationship pools belong to.
    pub failover_peer: Option<&'a str>,
}

/// Build the fragment for one subnet served by `ctx.rack`.
pub fn make_subnet_config(snap: &Snapshot, subnet: &Subnet, ctx: &SubnetContext<'_>) -> SubnetConfig {
    let cidr = subnet.cidr.trunc();
    let (subnet_mask, broadcast_ip) = match cidr {
        IpNet::V4(net) => (
            Some(net.netmask().to_string()),
            Some(net.broadcast().to_string()),
        ),
        IpNet::V6(_) => (None, None),
    };

    let dns_servers = if subnet.dns_servers.is_empty() {
        topology::default_dns_servers(snap, ctx.rack, subnet, ctx.settings)
    } else {
        subnet.dns_servers.clone()
    };

    let pools = snap
        .ranges_in_subnet(subnet.id)
        .iter()
        .filter(|r| r.is_dynamic())
        .map(|r| Pool {
            ip_range_low: r.start_ip.to_string(),
            ip_range_high: r.end_ip.to_string(),
            failover_peer: ctx.failover_peer.map(str::to_owned),
        })
        .collect();

    SubnetConfig {
        subnet: cidr.network().to_string(),
        subnet_mask,
        subnet_cidr: cidr.to_string(),
        broadcast_ip,
        router_ip: subnet
            .gateway_ip
            .map(|gw| gw.to_string())
            .unwrap_or_default(),
        dns_servers,
        ntp_servers: ctx.ntp_servers.to_vec(),
        domain_name: ctx.settings.default_domain.clone(),
        search_list: ctx.settings.search_domains.clone(),
        pools,
        dhcp_snippets: subnet_snippets(snap, subnet.id),
    }
}

// ── Host reservations ────────────────────────────────────────────────

fn host_entry(label: &str, iface: &Interface, ip: IpAddr, snippets: &[Snippet]) -> Option<HostEntry> {
    Some(HostEntry {
        host: format!("{label}-{}", iface.name),
        mac: iface.mac?.to_string(),
        ip: ip.to_string(),
        dhcp_snippets: snippets.to_vec(),
    })
}

/// Static reservations for every interface holding a reservable address
/// on one of `subnets`.
///
/// The first address per interface wins. Bond members are skipped on
/// their own; instead each member of a bond with an address gets an entry
/// carrying the bond's IP and the member's MAC, unless that MAC already
/// has an entry for the bond.
pub fn make_hosts_for_subnets(snap: &Snapshot, subnets: &[EntityId]) -> Vec<HostEntry> {
    let wanted: HashSet<EntityId> = subnets.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();

    for address in snap.addresses() {
        if !address.is_reservable() || !address.subnet_id.is_some_and(|s| wanted.contains(&s)) {
            continue;
        }
        let (Some(ip), Some(iface)) = (address.ip, address.interface_id.and_then(|i| snap.interface(i)))
        else {
            continue;
        };
        if seen.contains(&iface.id) || iface.mac.is_none() {
            continue;
        }
        if snap
            .aggregate_of(iface.id)
            .is_some_and(|agg| agg.kind == InterfaceType::Bond)
        {
            continue;
        }
        seen.insert(iface.id);

        let Some(node) = iface.node_id.and_then(|n| snap.node(n)) else {
            let label = format!("unknown-{}", iface.id);
            hosts.extend(host_entry(&label, iface, ip, &[]));
            continue;
        };

        let snippets = node_snippets(snap, node.id);
        hosts.extend(host_entry(&node.hostname, iface, ip, &snippets));
        if iface.kind == InterfaceType::Bond {
            // A member usually shares the bond's MAC; one reservation per MAC.
            let mut macs: HashSet<MacAddress> = iface.mac.into_iter().collect();
            for member in iface.parents.iter().filter_map(|id| snap.interface(*id)) {
                seen.insert(member.id);
                if member.mac.is_some_and(|mac| !macs.insert(mac)) {
                    continue;
                }
                hosts.extend(host_entry(&node.hostname, member, ip, &snippets));
            }
        }
    }
    hosts
}
