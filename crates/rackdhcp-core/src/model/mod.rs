// ── Domain model ──
//
// Canonical inventory types read by the synthesis engine. Everything here is
// plain data; relationships are expressed as `EntityId` references and
// resolved through a `Snapshot`.

pub mod entity_id;
pub mod network;
pub mod node;
pub mod snippet;

use serde::{Deserialize, Serialize};
use strum::Display;

pub use entity_id::{EntityId, InvalidMac, MacAddress};
pub use network::{IpRange, RangeType, Subnet, Vlan};
pub use node::{AllocType, Interface, InterfaceType, Node, NodeType, StaticIpAddress};
pub use snippet::{DhcpSnippet, ServiceHealth, ServiceStatus, SnippetScope};

/// Entity categories carried by domain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Vlan,
    Subnet,
    IpRange,
    Node,
    Interface,
    StaticIpAddress,
    DhcpSnippet,
}

/// Common surface of every stored entity.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
}

macro_rules! impl_entity {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$kind;

                fn id(&self) -> EntityId {
                    self.id
                }
            }
        )*
    };
}

impl_entity! {
    Vlan => Vlan,
    Subnet => Subnet,
    IpRange => IpRange,
    Node => Node,
    Interface => Interface,
    StaticIpAddress => StaticIpAddress,
    DhcpSnippet => DhcpSnippet,
}
