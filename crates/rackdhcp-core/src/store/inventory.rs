// ── Inventory documents ──
//
// A serialized dump of the fleet's network model. This is how the data
// store is seeded: from YAML or JSON exported by the fleet database.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{
    DhcpSnippet, Entity, EntityId, Interface, IpRange, Node, ServiceHealth, StaticIpAddress,
    Subnet, Vlan,
};

/// Every entity the engine reads, in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub vlans: Vec<Vlan>,
    pub subnets: Vec<Subnet>,
    pub ip_ranges: Vec<IpRange>,
    pub nodes: Vec<Node>,
    pub interfaces: Vec<Interface>,
    pub addresses: Vec<StaticIpAddress>,
    pub snippets: Vec<DhcpSnippet>,
    pub service_health: Vec<ServiceHealth>,
    /// Persisted OMAPI secret, if one was generated before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omapi_key: Option<String>,
}

impl Inventory {
    /// Load from a `.json` file, or YAML for any other extension.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::Inventory {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, CoreError> {
        serde_yaml::from_str(text).map_err(|e| CoreError::Inventory {
            message: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::Inventory {
            message: e.to_string(),
        })
    }

    /// Reject duplicate ids and references to entities that do not exist.
    pub fn validate(&self) -> Result<(), CoreError> {
        let vlans = unique_ids(&self.vlans)?;
        let subnets = unique_ids(&self.subnets)?;
        unique_ids(&self.ip_ranges)?;
        let nodes = unique_ids(&self.nodes)?;
        let interfaces = unique_ids(&self.interfaces)?;
        unique_ids(&self.addresses)?;
        unique_ids(&self.snippets)?;

        let check = |what: &str, owner: EntityId, target: &str, id: EntityId, known: &HashSet<EntityId>| {
            if known.contains(&id) {
                Ok(())
            } else {
                Err(CoreError::ValidationFailed {
                    message: format!("{what} {owner} references unknown {target} {id}"),
                })
            }
        };

        for vlan in &self.vlans {
            for rack in [vlan.primary_rack, vlan.secondary_rack].into_iter().flatten() {
                check("vlan", vlan.id, "rack", rack, &nodes)?;
            }
            if let Some(relay) = vlan.relay_vlan {
                check("vlan", vlan.id, "vlan", relay, &vlans)?;
            }
        }
        for subnet in &self.subnets {
            check("subnet", subnet.id, "vlan", subnet.vlan_id, &vlans)?;
        }
        for range in &self.ip_ranges {
            check("ip range", range.id, "subnet", range.subnet_id, &subnets)?;
        }
        for iface in &self.interfaces {
            if let Some(node) = iface.node_id {
                check("interface", iface.id, "node", node, &nodes)?;
            }
            if let Some(vlan) = iface.vlan_id {
                check("interface", iface.id, "vlan", vlan, &vlans)?;
            }
            for parent in &iface.parents {
                check("interface", iface.id, "interface", *parent, &interfaces)?;
            }
        }
        for addr in &self.addresses {
            if let Some(subnet) = addr.subnet_id {
                check("address", addr.id, "subnet", subnet, &subnets)?;
            }
            if let Some(iface) = addr.interface_id {
                check("address", addr.id, "interface", iface, &interfaces)?;
            }
        }
        Ok(())
    }
}

fn unique_ids<T: Entity>(items: &[T]) -> Result<HashSet<EntityId>, CoreError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(CoreError::ValidationFailed {
                message: format!("duplicate {} id {}", T::KIND, item.id()),
            });
        }
    }
    Ok(seen)
}
