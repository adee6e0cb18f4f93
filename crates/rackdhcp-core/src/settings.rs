// ── Engine settings ──
//
// Fleet-wide knobs that feed synthesis and dispatch. Built by the caller
// (usually from rackdhcp-config); the core never reads files itself.

use std::net::IpAddr;
use std::time::Duration;

/// Domain handed to clients when nothing else is configured.
pub const DEFAULT_DOMAIN: &str = "maas";

/// Settings consumed by the synthesis engine and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Bound on each individual rack call.
    pub rpc_timeout: Duration,
    /// External NTP servers (hostnames or addresses).
    pub ntp_servers: Vec<String>,
    /// Hand out only `ntp_servers`, never the racks' own addresses.
    pub ntp_external_only: bool,
    pub default_domain: String,
    pub search_domains: Vec<String>,
    /// Region controller DNS addresses appended after the rack's own.
    pub region_dns: Vec<IpAddr>,
    /// Racks proxy DNS for the subnets they serve.
    pub use_rack_proxy: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(30),
            ntp_servers: Vec::new(),
            ntp_external_only: false,
            default_domain: DEFAULT_DOMAIN.to_owned(),
            search_domains: Vec::new(),
            region_dns: Vec::new(),
            use_rack_proxy: true,
        }
    }
}
