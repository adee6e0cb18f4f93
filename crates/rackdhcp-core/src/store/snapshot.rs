// ── Point-in-time view of the inventory ──
//
// Synthesis reads exclusively from a `Snapshot` so that one configuration
// document is computed against one consistent state, even while writers
// keep mutating the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{
    DhcpSnippet, Entity, EntityId, Interface, InterfaceType, IpRange, Node, StaticIpAddress,
    Subnet, Vlan,
};

fn index<T: Entity>(items: &[Arc<T>]) -> BTreeMap<EntityId, Arc<T>> {
    items.iter().map(|i| (i.id(), Arc::clone(i))).collect()
}

fn group<T: Entity>(
    items: &[Arc<T>],
    key: impl Fn(&T) -> Option<EntityId>,
) -> BTreeMap<EntityId, Vec<Arc<T>>> {
    let mut out: BTreeMap<EntityId, Vec<Arc<T>>> = BTreeMap::new();
    for item in items {
        if let Some(k) = key(item) {
            out.entry(k).or_default().push(Arc::clone(item));
        }
    }
    out
}

fn by_id<T: Entity>(items: &[Arc<T>], id: EntityId) -> Option<&Arc<T>> {
    items
        .binary_search_by_key(&id, |i| i.id())
        .ok()
        .map(|pos| &items[pos])
}

/// Immutable, indexed copy of every collection. All lists are in id order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    vlans: BTreeMap<EntityId, Arc<Vlan>>,
    subnets: BTreeMap<EntityId, Arc<Subnet>>,
    ip_ranges: Vec<Arc<IpRange>>,
    nodes: BTreeMap<EntityId, Arc<Node>>,
    interfaces: BTreeMap<EntityId, Arc<Interface>>,
    addresses: Vec<Arc<StaticIpAddress>>,
    snippets: Vec<Arc<DhcpSnippet>>,

    subnets_by_vlan: BTreeMap<EntityId, Vec<Arc<Subnet>>>,
    ranges_by_subnet: BTreeMap<EntityId, Vec<Arc<IpRange>>>,
    interfaces_by_node: BTreeMap<EntityId, Vec<Arc<Interface>>>,
    addresses_by_interface: BTreeMap<EntityId, Vec<Arc<StaticIpAddress>>>,
    /// Member interface id -> bond or bridge it belongs to.
    aggregate_of: BTreeMap<EntityId, Arc<Interface>>,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vlans: &[Arc<Vlan>],
        subnets: &[Arc<Subnet>],
        ip_ranges: &[Arc<IpRange>],
        nodes: &[Arc<Node>],
        interfaces: &[Arc<Interface>],
        addresses: &[Arc<StaticIpAddress>],
        snippets: &[Arc<DhcpSnippet>],
    ) -> Self {
        let mut aggregate_of = BTreeMap::new();
        for iface in interfaces
            .iter()
            .filter(|i| matches!(i.kind, InterfaceType::Bond | InterfaceType::Bridge))
        {
            for member in &iface.parents {
                aggregate_of.entry(*member).or_insert_with(|| Arc::clone(iface));
            }
        }

        Self {
            vlans: index(vlans),
            subnets: index(subnets),
            ip_ranges: ip_ranges.to_vec(),
            nodes: index(nodes),
            interfaces: index(interfaces),
            addresses: addresses.to_vec(),
            snippets: snippets.to_vec(),
            subnets_by_vlan: group(subnets, |s| Some(s.vlan_id)),
            ranges_by_subnet: group(ip_ranges, |r| Some(r.subnet_id)),
            interfaces_by_node: group(interfaces, |i| i.node_id),
            addresses_by_interface: group(addresses, |a| a.interface_id),
            aggregate_of,
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn vlan(&self, id: EntityId) -> Option<&Arc<Vlan>> {
        self.vlans.get(&id)
    }

    pub fn subnet(&self, id: EntityId) -> Option<&Arc<Subnet>> {
        self.subnets.get(&id)
    }

    pub fn node(&self, id: EntityId) -> Option<&Arc<Node>> {
        self.nodes.get(&id)
    }

    pub fn interface(&self, id: EntityId) -> Option<&Arc<Interface>> {
        self.interfaces.get(&id)
    }

    pub fn ip_range(&self, id: EntityId) -> Option<&Arc<IpRange>> {
        by_id(&self.ip_ranges, id)
    }

    pub fn address(&self, id: EntityId) -> Option<&Arc<StaticIpAddress>> {
        by_id(&self.addresses, id)
    }

    pub fn snippet(&self, id: EntityId) -> Option<&Arc<DhcpSnippet>> {
        by_id(&self.snippets, id)
    }

    /// Node by id or hostname.
    pub fn find_node(&self, ident: &str) -> Option<&Arc<Node>> {
        if let Ok(id) = ident.parse::<EntityId>() {
            if let Some(node) = self.nodes.get(&id) {
                return Some(node);
            }
        }
        self.nodes.values().find(|n| n.hostname == ident)
    }

    // ── Collections ──────────────────────────────────────────────────

    pub fn vlans(&self) -> impl Iterator<Item = &Arc<Vlan>> {
        self.vlans.values()
    }

    pub fn subnets(&self) -> impl Iterator<Item = &Arc<Subnet>> {
        self.subnets.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn racks(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values().filter(|n| n.node_type.is_rack())
    }

    pub fn addresses(&self) -> &[Arc<StaticIpAddress>] {
        &self.addresses
    }

    pub fn snippets(&self) -> &[Arc<DhcpSnippet>] {
        &self.snippets
    }

    // ── Relationships ────────────────────────────────────────────────

    pub fn subnets_on_vlan(&self, vlan_id: EntityId) -> &[Arc<Subnet>] {
        self.subnets_by_vlan
            .get(&vlan_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn ranges_in_subnet(&self, subnet_id: EntityId) -> &[Arc<IpRange>] {
        self.ranges_by_subnet
            .get(&subnet_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn interfaces_of_node(&self, node_id: EntityId) -> &[Arc<Interface>] {
        self.interfaces_by_node
            .get(&node_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn addresses_on_interface(&self, interface_id: EntityId) -> &[Arc<StaticIpAddress>] {
        self.addresses_by_interface
            .get(&interface_id)
            .map_or(&[], Vec::as_slice)
    }

    /// The bond or bridge `member_id` is enslaved to.
    pub fn aggregate_of(&self, member_id: EntityId) -> Option<&Arc<Interface>> {
        self.aggregate_of.get(&member_id)
    }

    /// VLAN of the subnet an address sits on.
    pub fn vlan_of_address(&self, address: &StaticIpAddress) -> Option<&Arc<Vlan>> {
        let subnet = self.subnet(address.subnet_id?)?;
        self.vlan(subnet.vlan_id)
    }

    /// Whether any dynamic range exists on the subnet.
    pub fn has_dynamic_range(&self, subnet_id: EntityId) -> bool {
        self.ranges_in_subnet(subnet_id).iter().any(|r| r.is_dynamic())
    }

    // ── Mutation for what-if synthesis ───────────────────────────────

    /// Replace or add `snippet`, forcing it enabled. Used to check a
    /// snippet against a daemon before it is saved.
    pub fn overlay_snippet(&mut self, mut snippet: DhcpSnippet) {
        snippet.enabled = true;
        let snippet = Arc::new(snippet);
        match self.snippets.iter_mut().find(|s| s.id == snippet.id) {
            Some(slot) => *slot = snippet,
            None => {
                self.snippets.push(snippet);
                self.snippets.sort_by_key(|s| s.id);
            }
        }
    }
}
