// ── Failover and shared-network assembler ──
//
// Assembles the full per-rack configuration: one shared network per
// managed VLAN and family, failover pairings for HA VLANs, host
// reservations, bound interfaces and global snippets.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use rackdhcp_api::{
    DhcpPayload, FailoverMode, FailoverPeer, HostEntry, InterfaceName, IpVersion, SharedNetwork,
    Snippet, SubnetConfig,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use crate::builder::{self, SubnetContext};
use crate::error::CoreError;
use crate::model::{EntityId, Subnet, Vlan};
use crate::settings::EngineSettings;
use crate::store::Snapshot;
use crate::topology::{self, NtpKey};

// ── Failover ─────────────────────────────────────────────────────────

/// Failover descriptor for `vlan` seen from `rack`, plus the peer rack.
/// `None` when the VLAN has no secondary.
pub fn make_failover_peer_config(
    snap: &Snapshot,
    vlan: &Vlan,
    rack: EntityId,
    version: IpVersion,
) -> Result<Option<(FailoverPeer, EntityId)>, CoreError> {
    let (Some(primary), Some(secondary)) = (vlan.primary_rack, vlan.secondary_rack) else {
        return Ok(None);
    };
    let (mode, peer) = if rack == primary {
        (FailoverMode::Primary, secondary)
    } else if rack == secondary {
        (FailoverMode::Secondary, primary)
    } else {
        return Err(CoreError::topology(format!(
            "rack {rack} is neither primary nor secondary on vlan {}",
            vlan.id
        )));
    };

    let address_of = |who: EntityId| {
        topology::ip_address_for_rack(snap, who, vlan.id, version).ok_or_else(|| {
            CoreError::topology(format!(
                "rack {who} has no {version} address on vlan {} for failover",
                vlan.id
            ))
        })
    };
    let peer_config = FailoverPeer {
        name: format!("failover-vlan-{}", vlan.id),
        mode,
        address: address_of(rack)?.to_string(),
        peer_address: address_of(peer)?.to_string(),
    };
    Ok(Some((peer_config, peer)))
}

// ── Per-VLAN bundle ──────────────────────────────────────────────────

/// Where subnet NTP servers come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtpSource {
    /// Fixed external servers for every subnet.
    External(Vec<String>),
    /// The serving rack's own addresses, keyed by `(space, family)`.
    Racks(BTreeMap<NtpKey, IpAddr>),
}

impl NtpSource {
    pub fn for_rack(snap: &Snapshot, rack: EntityId, settings: &EngineSettings) -> Self {
        if settings.ntp_external_only {
            Self::External(settings.ntp_servers.clone())
        } else {
            Self::Racks(topology::ntp_addresses_for_rack(snap, rack))
        }
    }
}

/// Everything one rack needs for one VLAN in one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanBundle {
    pub failover: Option<FailoverPeer>,
    /// Sorted by CIDR string, so 10.0.10.0/24 precedes 10.0.2.0/24.
    pub subnets: Vec<SubnetConfig>,
    pub hosts: Vec<HostEntry>,
    pub interface: String,
}

/// Build the bundle for `vlan` and its `subnets` (all of `version`).
pub fn get_dhcp_configure_for(
    snap: &Snapshot,
    version: IpVersion,
    rack: EntityId,
    vlan: &Vlan,
    subnets: &[Arc<Subnet>],
    ntp: &NtpSource,
    settings: &EngineSettings,
) -> Result<VlanBundle, CoreError> {
    let candidates = topology::interfaces_with_ip_on_vlan(snap, rack, vlan.id, version);
    let iface = topology::best_interface(candidates).ok_or_else(|| {
        CoreError::topology(format!(
            "rack {rack} has no interface with an {version} address on vlan {}",
            vlan.id
        ))
    })?;

    // A relayed VLAN shares the failover relationship of its target.
    let failover_vlan = match vlan.relay_vlan {
        Some(target) => snap
            .vlan(target)
            .map(|v| &**v)
            .ok_or_else(|| CoreError::not_found("vlan", target))?,
        None => vlan,
    };
    let failover = make_failover_peer_config(snap, failover_vlan, rack, version)?;

    let ntp_servers: Vec<String> = match ntp {
        NtpSource::External(servers) => servers.clone(),
        NtpSource::Racks(own) => {
            let key = (vlan.space_id, version);
            let peer = failover
                .as_ref()
                .map(|(_, peer)| topology::ntp_addresses_for_rack(snap, *peer));
            [own.get(&key), peer.as_ref().and_then(|p| p.get(&key))]
                .into_iter()
                .flatten()
                .map(ToString::to_string)
                .collect()
        }
    };

    let ctx = SubnetContext {
        rack,
        settings,
        ntp_servers: &ntp_servers,
        failover_peer: failover.as_ref().map(|(p, _)| p.name.as_str()),
    };
    let mut configs: Vec<SubnetConfig> = subnets
        .iter()
        .map(|s| builder::make_subnet_config(snap, s, &ctx))
        .collect();
    configs.sort_by(|a, b| a.subnet.cmp(&b.subnet));

    let ids: Vec<EntityId> = subnets.iter().map(|s| s.id).collect();
    let hosts = builder::make_hosts_for_subnets(snap, &ids);

    Ok(VlanBundle {
        failover: failover.map(|(p, _)| p),
        subnets: configs,
        hosts,
        interface: iface.name.clone(),
    })
}

// ── Full configuration ───────────────────────────────────────────────

/// The configuration of one address family on one rack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyConfig {
    pub failover_peers: Vec<FailoverPeer>,
    pub shared_networks: Vec<SharedNetwork>,
    pub hosts: Vec<HostEntry>,
    pub interfaces: Vec<InterfaceName>,
}

impl FamilyConfig {
    fn absorb(&mut self, vlan: &Vlan, bundle: VlanBundle) {
        if let Some(peer) = bundle
            .failover
            .filter(|p| !self.failover_peers.contains(p))
        {
            self.failover_peers.push(peer);
        }
        self.interfaces.push(InterfaceName {
            name: bundle.interface.clone(),
        });
        self.shared_networks.push(SharedNetwork {
            name: format!("vlan-{}", vlan.id),
            mtu: vlan.mtu,
            interface: Some(bundle.interface),
            subnets: bundle.subnets,
        });
        self.hosts.extend(bundle.hosts);
    }

    fn finish(&mut self) {
        self.interfaces.sort();
        self.interfaces.dedup();
    }

    /// No shared networks: the daemon for this family should be off.
    pub fn is_empty(&self) -> bool {
        self.shared_networks.is_empty()
    }
}

/// Complete synthesized configuration for one rack.
#[derive(Debug, Serialize)]
pub struct DhcpConfiguration {
    pub rack: EntityId,
    #[serde(skip)]
    omapi_key: SecretString,
    pub v4: FamilyConfig,
    pub v6: FamilyConfig,
    pub global_dhcp_snippets: Vec<Snippet>,
}

impl DhcpConfiguration {
    pub fn family(&self, version: IpVersion) -> &FamilyConfig {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }

    /// The wire document for one family's daemon.
    pub fn payload(&self, version: IpVersion) -> DhcpPayload {
        let family = self.family(version);
        DhcpPayload {
            omapi_key: self.omapi_key.expose_secret().to_owned(),
            failover_peers: family.failover_peers.clone(),
            shared_networks: family.shared_networks.clone(),
            hosts: family.hosts.clone(),
            interfaces: family.interfaces.clone(),
            global_dhcp_snippets: self.global_dhcp_snippets.clone(),
        }
    }
}

/// Synthesize the whole configuration `rack` should run.
pub fn get_dhcp_configuration(
    snap: &Snapshot,
    rack: EntityId,
    settings: &EngineSettings,
    omapi_key: SecretString,
) -> Result<DhcpConfiguration, CoreError> {
    let node = snap
        .node(rack)
        .ok_or_else(|| CoreError::not_found("rack", rack))?;
    let ntp = NtpSource::for_rack(snap, rack, settings);
    let mut v4 = FamilyConfig::default();
    let mut v6 = FamilyConfig::default();

    for vlan in topology::managed_vlans(snap, rack) {
        let (subnets_v4, subnets_v6) = topology::split_managed_subnets(snap.subnets_on_vlan(vlan.id));
        for (version, subnets, family) in [
            (IpVersion::V4, subnets_v4, &mut v4),
            (IpVersion::V6, subnets_v6, &mut v6),
        ] {
            if subnets.is_empty() {
                continue;
            }
            if topology::interfaces_with_ip_on_vlan(snap, rack, vlan.id, version).is_empty() {
                warn!(
                    rack = %rack,
                    vlan = %vlan.id,
                    %version,
                    "rack has no interface with an address on vlan, skipping"
                );
                continue;
            }
            let bundle = get_dhcp_configure_for(snap, version, rack, vlan, &subnets, &ntp, settings)?;
            family.absorb(vlan, bundle);
        }
    }
    v4.finish();
    v6.finish();

    debug!(
        rack = %rack,
        hostname = %node.hostname,
        shared_networks_v4 = v4.shared_networks.len(),
        shared_networks_v6 = v6.shared_networks.len(),
        "synthesized dhcp configuration"
    );

    Ok(DhcpConfiguration {
        rack,
        omapi_key,
        v4,
        v6,
        global_dhcp_snippets: builder::global_snippets(snap),
    })
}
