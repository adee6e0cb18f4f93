// rackdhcp-api: wire document and async client for rack controller DHCP services

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::RackClient;
pub use error::Error;
pub use models::{
    DhcpConfigError, DhcpPayload, FailoverMode, FailoverPeer, HostEntry, InterfaceName,
    IpVersion, Pool, SharedNetwork, Snippet, SubnetConfig,
};
pub use transport::{TlsMode, TransportConfig};
