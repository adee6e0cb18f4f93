//! DHCP configuration synthesis and rack orchestration for `rackdhcp`.
//!
//! This crate turns a network inventory (VLANs, subnets, ranges, nodes,
//! interfaces, addresses, snippets) into the per-rack documents consumed by
//! the rack DHCP daemons, and pushes them:
//!
//! - **[`ipset`]**: interval-set algebra over IPv4/IPv6 addresses with
//!   purpose labels, unused-space computation and usage statistics.
//!
//! - **[`topology`]**: which rack interface serves which VLAN, which
//!   address a rack answers on, NTP and DNS server resolution.
//!
//! - **[`builder`]** and **[`assembler`]**: subnet fragments, host
//!   reservations, failover peers and shared networks, assembled into a
//!   [`DhcpConfiguration`] per rack.
//!
//! - **[`DhcpEngine`]**: facade that applies configuration through a
//!   [`RackRpc`] implementation, validates candidate snippets, records
//!   service health, and can re-apply automatically on store events.
//!
//! - **[`DataStore`]**: lock-free in-memory inventory. Every mutation
//!   publishes a [`DomainEvent`] on a broadcast bus; reads go through
//!   consistent [`Snapshot`]s.

pub mod assembler;
pub mod builder;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod ipset;
pub mod model;
pub mod rpc;
pub mod settings;
pub mod store;
pub mod topology;

#[cfg(test)]
mod fixtures;

// ── Primary re-exports ──────────────────────────────────────────────
pub use assembler::{DhcpConfiguration, FamilyConfig};
pub use diff::{DhcpState, StateDiff};
pub use engine::DhcpEngine;
pub use error::CoreError;
pub use events::DomainEvent;
pub use ipset::{AddressRange, AddressSet, RangeStatistics, SetBound};
pub use rpc::{RackPool, RackRpc};
pub use settings::EngineSettings;
pub use store::{DataStore, Inventory, Snapshot};

pub use model::{
    AllocType, DhcpSnippet, EntityId, EntityKind, Interface, InterfaceType, IpRange, MacAddress,
    Node, NodeType, RangeType, ServiceHealth, ServiceStatus, SnippetScope, StaticIpAddress, Subnet,
    Vlan,
};

pub use rackdhcp_api::{DhcpConfigError, DhcpPayload, IpVersion};
