// ── Nodes, interfaces and assigned addresses ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rackdhcp_api::IpVersion;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{EntityId, MacAddress};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeType {
    #[default]
    Machine,
    Device,
    RackController,
    RegionController,
    RegionAndRackController,
}

impl NodeType {
    /// Whether nodes of this type run DHCP daemons.
    pub fn is_rack(self) -> bool {
        matches!(self, Self::RackController | Self::RegionAndRackController)
    }
}

/// A managed machine, device or controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: EntityId,
    pub hostname: String,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub boot_interface_id: Option<EntityId>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceType {
    #[default]
    Physical,
    Bond,
    Bridge,
    Vlan,
    Unknown,
}

/// A network interface on a node, or an orphan interface observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub id: EntityId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: InterfaceType,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default)]
    pub vlan_id: Option<EntityId>,
    #[serde(default)]
    pub node_id: Option<EntityId>,
    /// Bond and bridge members, or the single parent of a VLAN interface.
    #[serde(default)]
    pub parents: Vec<EntityId>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AllocType {
    Auto,
    Sticky,
    UserReserved,
    Discovered,
}

impl AllocType {
    /// Kinds the fleet manager configures, as opposed to merely observing.
    pub fn is_static(self) -> bool {
        !matches!(self, Self::Discovered)
    }

    pub fn is_sticky_or_auto(self) -> bool {
        matches!(self, Self::Sticky | Self::Auto)
    }
}

/// An address assignment on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpAddress {
    pub id: EntityId,
    /// `None` while the address is not yet leased.
    #[serde(default)]
    pub ip: Option<IpAddr>,
    pub alloc_type: AllocType,
    #[serde(default)]
    pub subnet_id: Option<EntityId>,
    #[serde(default)]
    pub interface_id: Option<EntityId>,
    /// Set on temporary, in-flight allocations.
    #[serde(default)]
    pub temp_expires_on: Option<DateTime<Utc>>,
}

impl StaticIpAddress {
    pub fn version(&self) -> Option<IpVersion> {
        self.ip.as_ref().map(IpVersion::of)
    }

    /// Eligible to become a host reservation.
    pub fn is_reservable(&self) -> bool {
        self.ip.is_some() && self.alloc_type.is_static() && self.temp_expires_on.is_none()
    }
}
