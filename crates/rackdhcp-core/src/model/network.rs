// ── Broadcast domains and addressing ──

use std::net::IpAddr;

use ipnet::IpNet;
use rackdhcp_api::IpVersion;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::EntityId;

fn default_mtu() -> u32 {
    1500
}

fn default_true() -> bool {
    true
}

/// A broadcast domain and its DHCP management roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: EntityId,
    #[serde(default)]
    pub vid: u16,
    #[serde(default)]
    pub name: Option<String>,
    pub fabric_id: EntityId,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default)]
    pub dhcp_on: bool,
    #[serde(default)]
    pub primary_rack: Option<EntityId>,
    #[serde(default)]
    pub secondary_rack: Option<EntityId>,
    #[serde(default)]
    pub space_id: Option<EntityId>,
    /// VLAN this one's DHCP traffic is relayed to.
    #[serde(default)]
    pub relay_vlan: Option<EntityId>,
}

impl Vlan {
    /// Primary and secondary are both assigned.
    pub fn is_ha(&self) -> bool {
        self.primary_rack.is_some() && self.secondary_rack.is_some()
    }

    /// Whether `rack` holds the primary or secondary role.
    pub fn is_served_by(&self, rack: EntityId) -> bool {
        self.primary_rack == Some(rack) || self.secondary_rack == Some(rack)
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None if self.vid == 0 => "untagged".into(),
            None => format!("vid-{}", self.vid),
        }
    }
}

/// An IP network attached to a VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    pub cidr: IpNet,
    #[serde(default)]
    pub gateway_ip: Option<IpAddr>,
    /// Overrides the default DNS servers when non-empty.
    #[serde(default)]
    pub dns_servers: Vec<IpAddr>,
    pub vlan_id: EntityId,
    /// Unmanaged subnets are excluded from all synthesis.
    #[serde(default = "default_true")]
    pub managed: bool,
}

impl Subnet {
    pub fn version(&self) -> IpVersion {
        IpVersion::of(&self.cidr.addr())
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.cidr.trunc().to_string())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RangeType {
    Dynamic,
    Reserved,
}

/// A start/end interval inside a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub id: EntityId,
    pub subnet_id: EntityId,
    pub start_ip: IpAddr,
    pub end_ip: IpAddr,
    #[serde(rename = "type")]
    pub range_type: RangeType,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl IpRange {
    pub fn is_dynamic(&self) -> bool {
        self.range_type == RangeType::Dynamic
    }
}
