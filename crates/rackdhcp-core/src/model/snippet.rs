// ── Configuration snippets and service health ──

use rackdhcp_api::{IpVersion, Snippet};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::EntityId;

/// Where a snippet is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnippetScope {
    #[default]
    Global,
    Subnet {
        subnet_id: EntityId,
    },
    Node {
        node_id: EntityId,
    },
}

/// A named configuration fragment. The value is opaque text that only the
/// remote daemon interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpSnippet {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: SnippetScope,
}

fn enabled_default() -> bool {
    true
}

impl DhcpSnippet {
    pub fn render(&self) -> Snippet {
        Snippet {
            name: self.name.clone(),
            description: self.description.clone(),
            value: self.value.clone(),
        }
    }
}

/// DHCP daemon health on one rack for one family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Running,
    Off,
    Dead,
}

/// Per-rack, per-family service health record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub rack_id: EntityId,
    pub version: IpVersion,
    pub status: ServiceStatus,
    #[serde(default)]
    pub status_info: String,
}

impl ServiceHealth {
    pub fn unknown(rack_id: EntityId, version: IpVersion) -> Self {
        Self {
            rack_id,
            version,
            status: ServiceStatus::Unknown,
            status_info: String::new(),
        }
    }
}
