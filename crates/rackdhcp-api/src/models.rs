// Rack DHCP wire types
//
// The declarative document a rack controller's DHCP service consumes, plus
// the response envelope the rack answers with. Field names are part of the
// rack protocol and stay snake_case on the wire.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

// ── Address family ───────────────────────────────────────────────────

/// IP address family selector. The rack runs one daemon per family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize,
    Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum IpVersion {
    #[strum(serialize = "IPv4")]
    V4,
    #[strum(serialize = "IPv6")]
    V6,
}

impl IpVersion {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::V4 => 4,
            Self::V6 => 6,
        }
    }

    /// Path segment used by the rack endpoints (`v4` / `v6`).
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::V4 => "v4",
            Self::V6 => "v6",
        }
    }

    /// Name of the per-family DHCP service on a rack.
    pub fn service_name(self) -> &'static str {
        match self {
            Self::V4 => "dhcpd",
            Self::V6 => "dhcpd6",
        }
    }
}

impl From<IpVersion> for u8 {
    fn from(v: IpVersion) -> Self {
        v.number()
    }
}

impl TryFrom<u8> for IpVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::V4),
            6 => Ok(Self::V6),
            other => Err(format!("unsupported IP version {other}")),
        }
    }
}

// ── Document fragments ───────────────────────────────────────────────

/// A configuration snippet as rendered into the document. The value is
/// opaque text; only the remote daemon interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: String,
}

/// One dynamic address pool inside a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub ip_range_low: String,
    pub ip_range_high: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_peer: Option<String>,
}

/// Subnet fragment. IPv6 fragments carry no mask or broadcast address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfig {
    pub subnet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    pub subnet_cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_ip: Option<String>,
    /// Empty string when the subnet has no gateway.
    pub router_ip: String,
    pub dns_servers: Vec<IpAddr>,
    pub ntp_servers: Vec<String>,
    pub domain_name: String,
    #[serde(default)]
    pub search_list: Vec<String>,
    pub pools: Vec<Pool>,
    pub dhcp_snippets: Vec<Snippet>,
}

/// All subnets served on one VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedNetwork {
    pub name: String,
    pub mtu: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub subnets: Vec<SubnetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailoverMode {
    Primary,
    Secondary,
}

/// Failover pairing for one HA VLAN, from the point of view of the rack
/// receiving the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverPeer {
    pub name: String,
    pub mode: FailoverMode,
    pub address: String,
    pub peer_address: String,
}

/// Static MAC to IP reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub host: String,
    pub mac: String,
    pub ip: String,
    pub dhcp_snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceName {
    pub name: String,
}

/// The full document pushed to one daemon on one rack.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpPayload {
    pub omapi_key: String,
    pub failover_peers: Vec<FailoverPeer>,
    pub shared_networks: Vec<SharedNetwork>,
    pub hosts: Vec<HostEntry>,
    pub interfaces: Vec<InterfaceName>,
    pub global_dhcp_snippets: Vec<Snippet>,
}

impl fmt::Debug for DhcpPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhcpPayload")
            .field("omapi_key", &"[REDACTED]")
            .field("failover_peers", &self.failover_peers)
            .field("shared_networks", &self.shared_networks)
            .field("hosts", &self.hosts)
            .field("interfaces", &self.interfaces)
            .field("global_dhcp_snippets", &self.global_dhcp_snippets)
            .finish()
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// One error reported by the daemon's config checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DhcpConfigError {
    pub error: String,
    #[serde(default)]
    pub line_num: Option<u32>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

/// Envelope every rack endpoint answers with:
/// ```json
/// { "status": "ok", "message": null, "data": {...} }
/// ```
#[derive(Debug, Deserialize)]
pub(crate) struct RackResponse<T> {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// `data` of a validation response. `errors: null` means the document is valid.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValidationData {
    #[serde(default)]
    pub errors: Option<Vec<DhcpConfigError>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ip_version_serializes_as_number() {
        assert_eq!(serde_json::to_string(&IpVersion::V6).unwrap(), "6");
        let v: IpVersion = serde_json::from_str("4").unwrap();
        assert_eq!(v, IpVersion::V4);
        assert!(serde_json::from_str::<IpVersion>("5").is_err());
    }

    #[test]
    fn ipv6_subnet_omits_mask_and_broadcast() {
        let subnet = SubnetConfig {
            subnet: "fd38:c341:27da:c831::".into(),
            subnet_mask: None,
            subnet_cidr: "fd38:c341:27da:c831::/64".into(),
            broadcast_ip: None,
            router_ip: String::new(),
            dns_servers: vec![],
            ntp_servers: vec![],
            domain_name: "maas".into(),
            search_list: vec![],
            pools: vec![],
            dhcp_snippets: vec![],
        };
        let json = serde_json::to_value(&subnet).unwrap();
        assert!(json.get("subnet_mask").is_none());
        assert!(json.get("broadcast_ip").is_none());
        assert_eq!(json["router_ip"], "");
    }

    #[test]
    fn pool_without_peer_omits_field() {
        let pool = Pool {
            ip_range_low: "10.0.0.10".into(),
            ip_range_high: "10.0.0.20".into(),
            failover_peer: None,
        };
        let json = serde_json::to_value(&pool).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ip_range_low": "10.0.0.10", "ip_range_high": "10.0.0.20"})
        );
    }

    #[test]
    fn payload_debug_redacts_omapi_key() {
        let payload = DhcpPayload {
            omapi_key: "c2VjcmV0".into(),
            failover_peers: vec![],
            shared_networks: vec![],
            hosts: vec![],
            interfaces: vec![],
            global_dhcp_snippets: vec![],
        };
        let dbg = format!("{payload:?}");
        assert!(!dbg.contains("c2VjcmV0"));
        assert!(dbg.contains("REDACTED"));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ack {
        applied: u32,
    }

    #[test]
    fn envelope_data_needs_no_default() {
        let bare: RackResponse<Ack> = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert_eq!(bare.status, "ok");
        assert!(bare.message.is_none());
        assert!(bare.data.is_none());

        let full: RackResponse<Ack> =
            serde_json::from_str(r#"{"status": "ok", "data": {"applied": 3}}"#).unwrap();
        assert_eq!(full.data, Some(Ack { applied: 3 }));
    }

    #[test]
    fn failover_mode_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&FailoverMode::Secondary).unwrap(),
            "\"secondary\""
        );
        assert_eq!(FailoverMode::Primary.to_string(), "primary");
    }
}
