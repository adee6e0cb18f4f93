// ── Domain events ──
//
// Every store mutation publishes one or more `DomainEvent`s on an
// in-process broadcast bus. Derived events (a VLAN's DHCP flag flipping,
// service health moving) are explicit variants rather than something a
// subscriber has to infer from before/after state.

use rackdhcp_api::IpVersion;
use serde::Serialize;

use crate::model::{EntityId, EntityKind, ServiceStatus};

/// Capacity of the broadcast channel. Slow subscribers see `Lagged`.
pub(crate) const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Created {
        kind: EntityKind,
        id: EntityId,
    },
    Updated {
        kind: EntityKind,
        id: EntityId,
    },
    Deleted {
        kind: EntityKind,
        id: EntityId,
    },
    VlanDhcpToggled {
        vlan_id: EntityId,
        dhcp_on: bool,
    },
    ServiceStatusChanged {
        rack_id: EntityId,
        version: IpVersion,
        status: ServiceStatus,
    },
    OmapiKeyGenerated,
}

impl DomainEvent {
    /// Whether the event can change synthesized configuration.
    pub fn affects_configuration(&self) -> bool {
        !matches!(
            self,
            Self::ServiceStatusChanged { .. } | Self::OmapiKeyGenerated
        )
    }
}
