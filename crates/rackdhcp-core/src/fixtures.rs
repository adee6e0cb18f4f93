// Inventory builder shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::net::IpAddr;

use crate::model::{
    AllocType, DhcpSnippet, EntityId, Interface, InterfaceType, IpRange, MacAddress, Node,
    NodeType, RangeType, SnippetScope, StaticIpAddress, Subnet, Vlan,
};
use crate::store::{DataStore, Inventory, Snapshot};

/// Builds an `Inventory` with sequential ids and deterministic MACs.
#[derive(Debug, Default)]
pub(crate) struct Fleet {
    pub inv: Inventory,
    next_id: u64,
}

pub(crate) fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id)
    }

    fn node(&mut self, hostname: &str, node_type: NodeType) -> EntityId {
        let id = self.next();
        self.inv.nodes.push(Node {
            id,
            hostname: hostname.into(),
            node_type,
            boot_interface_id: None,
        });
        id
    }

    pub fn rack(&mut self, hostname: &str) -> EntityId {
        self.node(hostname, NodeType::RackController)
    }

    pub fn machine(&mut self, hostname: &str) -> EntityId {
        self.node(hostname, NodeType::Machine)
    }

    /// A VLAN with DHCP on when a primary rack is given.
    pub fn vlan(&mut self, primary: Option<EntityId>, secondary: Option<EntityId>) -> EntityId {
        let id = self.next();
        self.inv.vlans.push(Vlan {
            id,
            vid: 0,
            name: None,
            fabric_id: EntityId::new(1),
            mtu: 1500,
            dhcp_on: primary.is_some(),
            primary_rack: primary,
            secondary_rack: secondary,
            space_id: None,
            relay_vlan: None,
        });
        id
    }

    pub fn vlan_mut(&mut self, id: EntityId) -> &mut Vlan {
        self.inv.vlans.iter_mut().find(|v| v.id == id).unwrap()
    }

    pub fn subnet(&mut self, vlan_id: EntityId, cidr: &str) -> EntityId {
        let id = self.next();
        self.inv.subnets.push(Subnet {
            id,
            name: None,
            cidr: cidr.parse().unwrap(),
            gateway_ip: None,
            dns_servers: Vec::new(),
            vlan_id,
            managed: true,
        });
        id
    }

    pub fn subnet_mut(&mut self, id: EntityId) -> &mut Subnet {
        self.inv.subnets.iter_mut().find(|s| s.id == id).unwrap()
    }

    pub fn dynamic_range(&mut self, subnet_id: EntityId, start: &str, end: &str) -> EntityId {
        let id = self.next();
        self.inv.ip_ranges.push(IpRange {
            id,
            subnet_id,
            start_ip: ip(start),
            end_ip: ip(end),
            range_type: RangeType::Dynamic,
            user: None,
            comment: None,
        });
        id
    }

    pub fn interface(
        &mut self,
        node_id: Option<EntityId>,
        name: &str,
        kind: InterfaceType,
        vlan_id: EntityId,
    ) -> EntityId {
        let id = self.next();
        let b = id.get().to_be_bytes();
        self.inv.interfaces.push(Interface {
            id,
            name: name.into(),
            kind,
            mac: Some(MacAddress::from_octets([0x52, 0x54, 0, 0, b[6], b[7]])),
            vlan_id: Some(vlan_id),
            node_id,
            parents: Vec::new(),
        });
        id
    }

    pub fn physical(&mut self, node_id: EntityId, name: &str, vlan_id: EntityId) -> EntityId {
        self.interface(Some(node_id), name, InterfaceType::Physical, vlan_id)
    }

    pub fn bond(
        &mut self,
        node_id: EntityId,
        name: &str,
        vlan_id: EntityId,
        members: &[EntityId],
    ) -> EntityId {
        let id = self.interface(Some(node_id), name, InterfaceType::Bond, vlan_id);
        self.interface_mut(id).parents = members.to_vec();
        id
    }

    pub fn interface_mut(&mut self, id: EntityId) -> &mut Interface {
        self.inv.interfaces.iter_mut().find(|i| i.id == id).unwrap()
    }

    pub fn address(
        &mut self,
        interface_id: EntityId,
        subnet_id: EntityId,
        addr: &str,
        alloc_type: AllocType,
    ) -> EntityId {
        let id = self.next();
        self.inv.addresses.push(StaticIpAddress {
            id,
            ip: Some(ip(addr)),
            alloc_type,
            subnet_id: Some(subnet_id),
            interface_id: Some(interface_id),
            temp_expires_on: None,
        });
        id
    }

    pub fn sticky(&mut self, interface_id: EntityId, subnet_id: EntityId, addr: &str) -> EntityId {
        self.address(interface_id, subnet_id, addr, AllocType::Sticky)
    }

    pub fn snippet(&mut self, name: &str, value: &str, scope: SnippetScope) -> EntityId {
        let id = self.next();
        self.inv.snippets.push(DhcpSnippet {
            id,
            name: name.into(),
            description: String::new(),
            value: value.into(),
            enabled: true,
            scope,
        });
        id
    }

    pub fn store(&self) -> DataStore {
        DataStore::from_inventory(self.inv.clone()).unwrap()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store().snapshot()
    }
}
