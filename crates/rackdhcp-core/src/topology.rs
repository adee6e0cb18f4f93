// ── Topology resolver ──
//
// Answers "which interface and address does this rack use to serve that
// VLAN". Every function here is a pure read over a `Snapshot`, so results
// are deterministic for a given inventory state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use indexmap::IndexSet;
use rackdhcp_api::IpVersion;

use crate::model::{EntityId, Interface, InterfaceType, StaticIpAddress, Subnet, Vlan};
use crate::settings::EngineSettings;
use crate::store::Snapshot;

/// Lower binds first: bond, then physical, then VLAN-tagged, then the rest.
pub fn interface_priority(kind: InterfaceType) -> u8 {
    match kind {
        InterfaceType::Bond => 0,
        InterfaceType::Physical => 1,
        InterfaceType::Vlan => 2,
        InterfaceType::Bridge | InterfaceType::Unknown => 3,
    }
}

/// Pick the interface to bind to. Ties go to the earliest candidate.
pub fn best_interface<'a>(
    candidates: impl IntoIterator<Item = &'a Arc<Interface>>,
) -> Option<&'a Arc<Interface>> {
    candidates
        .into_iter()
        .min_by_key(|iface| interface_priority(iface.kind))
}

/// The VLAN itself, the VLAN it relays to, and every VLAN relaying to it.
/// Only one relay hop is followed in each direction.
pub fn related_vlans(snap: &Snapshot, vlan_id: EntityId) -> BTreeSet<EntityId> {
    let mut related = BTreeSet::from([vlan_id]);
    if let Some(target) = snap.vlan(vlan_id).and_then(|v| v.relay_vlan) {
        related.insert(target);
    }
    related.extend(
        snap.vlans()
            .filter(|v| v.relay_vlan == Some(vlan_id))
            .map(|v| v.id),
    );
    related
}

/// Sticky or auto address, with a value, on a subnet of `vlan_id`.
pub fn ip_is_on_vlan(snap: &Snapshot, address: &StaticIpAddress, vlan_id: EntityId) -> bool {
    address.alloc_type.is_sticky_or_auto()
        && address.ip.is_some()
        && snap
            .vlan_of_address(address)
            .is_some_and(|vlan| vlan.id == vlan_id)
}

/// Interfaces of `rack` holding an address of `version` on `vlan_id` or a
/// VLAN related to it by relay.
///
/// Interfaces whose address sits on a subnet with a dynamic range come
/// first. Discovered addresses count only when no interface has a static
/// one. Each interface appears once.
pub fn interfaces_with_ip_on_vlan<'a>(
    snap: &'a Snapshot,
    rack: EntityId,
    vlan_id: EntityId,
    version: IpVersion,
) -> Vec<&'a Arc<Interface>> {
    let related = related_vlans(snap, vlan_id);
    let mut configured = Vec::new();
    let mut discovered = Vec::new();

    for iface in snap.interfaces_of_node(rack) {
        for address in snap.addresses_on_interface(iface.id) {
            let Some(ip) = address.ip else { continue };
            if IpVersion::of(&ip) != version {
                continue;
            }
            let Some(subnet) = address.subnet_id.and_then(|id| snap.subnet(id)) else {
                continue;
            };
            if !related.contains(&subnet.vlan_id) {
                continue;
            }
            let hit = (snap.has_dynamic_range(subnet.id), iface);
            if address.alloc_type.is_static() {
                configured.push(hit);
            } else {
                discovered.push(hit);
            }
        }
    }

    let mut hits = if configured.is_empty() {
        discovered
    } else {
        configured
    };
    // Stable: equal keys keep interface order.
    hits.sort_by_key(|(dynamic, _)| !dynamic);

    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|(_, iface)| seen.insert(iface.id))
        .map(|(_, iface)| iface)
        .collect()
}

/// First sticky or auto address of `version` on the interface that lands
/// on `vlan_id` or a relay-related VLAN.
pub fn ip_address_for_interface(
    snap: &Snapshot,
    iface: &Interface,
    vlan_id: EntityId,
    version: IpVersion,
) -> Option<IpAddr> {
    let related = related_vlans(snap, vlan_id);
    snap.addresses_on_interface(iface.id)
        .iter()
        .filter(|a| a.version() == Some(version))
        .find(|a| related.iter().any(|vlan| ip_is_on_vlan(snap, a, *vlan)))
        .and_then(|a| a.ip)
}

/// Address the rack serves `vlan_id` from: its best interface's address.
pub fn ip_address_for_rack(
    snap: &Snapshot,
    rack: EntityId,
    vlan_id: EntityId,
    version: IpVersion,
) -> Option<IpAddr> {
    let candidates = interfaces_with_ip_on_vlan(snap, rack, vlan_id, version);
    let iface = best_interface(candidates.iter().copied())?;
    ip_address_for_interface(snap, iface, vlan_id, version)
}

/// VLANs `rack` runs DHCP for: those it is primary or secondary on with
/// DHCP enabled, plus every VLAN relaying to one of them. Id order.
pub fn managed_vlans(snap: &Snapshot, rack: EntityId) -> Vec<&Arc<Vlan>> {
    let served: BTreeSet<EntityId> = snap
        .vlans()
        .filter(|v| v.dhcp_on && v.is_served_by(rack))
        .map(|v| v.id)
        .collect();
    snap.vlans()
        .filter(|v| served.contains(&v.id) || v.relay_vlan.is_some_and(|r| served.contains(&r)))
        .collect()
}

/// Key for per-space NTP addresses: `(space, family)`.
pub type NtpKey = (Option<EntityId>, IpVersion);

/// Lowest sticky or auto address of `rack` per `(space, family)`,
/// preferring addresses on DHCP-enabled VLANs.
pub fn ntp_addresses_for_rack(snap: &Snapshot, rack: EntityId) -> BTreeMap<NtpKey, IpAddr> {
    let mut candidates: Vec<(bool, IpAddr, NtpKey)> = snap
        .interfaces_of_node(rack)
        .iter()
        .flat_map(|iface| snap.addresses_on_interface(iface.id))
        .filter(|a| a.alloc_type.is_sticky_or_auto())
        .filter_map(|a| {
            let ip = a.ip?;
            let vlan = snap.vlan_of_address(a)?;
            Some((!vlan.dhcp_on, ip, (vlan.space_id, IpVersion::of(&ip))))
        })
        .collect();
    candidates.sort();

    let mut out = BTreeMap::new();
    for (_, ip, key) in candidates {
        out.entry(key).or_insert(ip);
    }
    out
}

/// DNS servers handed out on `subnet` when it has no override: the rack's
/// own addresses there (when proxying), then region DNS of the same family.
pub fn default_dns_servers(
    snap: &Snapshot,
    rack: EntityId,
    subnet: &Subnet,
    settings: &EngineSettings,
) -> Vec<IpAddr> {
    let version = subnet.version();
    let mut servers = IndexSet::new();
    if settings.use_rack_proxy {
        servers.extend(
            snap.interfaces_of_node(rack)
                .iter()
                .flat_map(|iface| snap.addresses_on_interface(iface.id))
                .filter(|a| a.subnet_id == Some(subnet.id) && a.alloc_type.is_static())
                .filter_map(|a| a.ip),
        );
    }
    servers.extend(
        settings
            .region_dns
            .iter()
            .filter(|ip| IpVersion::of(ip) == version)
            .copied(),
    );
    servers.into_iter().collect()
}

/// Split into IPv4 and IPv6 lists, dropping unmanaged subnets.
pub fn split_managed_subnets<'a>(
    subnets: impl IntoIterator<Item = &'a Arc<Subnet>>,
) -> (Vec<Arc<Subnet>>, Vec<Arc<Subnet>>) {
    subnets
        .into_iter()
        .filter(|s| s.managed)
        .map(Arc::clone)
        .partition(|s| s.version() == IpVersion::V4)
}
