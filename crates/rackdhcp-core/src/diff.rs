// ── Applied-state tracking ──
//
// Normalized form of a pushed document, used to tell what changed between
// two applies: whether the daemon must restart, and which host
// reservations could be patched in place.

use std::collections::BTreeMap;
use std::fmt;

use rackdhcp_api::{DhcpPayload, FailoverPeer, HostEntry, SharedNetwork, Snippet};
use serde::Serialize;

/// Order-insensitive view of a `DhcpPayload`. Hosts are keyed by MAC.
#[derive(Clone, PartialEq, Eq)]
pub struct DhcpState {
    omapi_key: String,
    failover_peers: Vec<FailoverPeer>,
    shared_networks: Vec<SharedNetwork>,
    hosts: BTreeMap<String, HostEntry>,
    interfaces: Vec<String>,
    global_dhcp_snippets: Vec<Snippet>,
}

impl fmt::Debug for DhcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhcpState")
            .field("omapi_key", &"[REDACTED]")
            .field("failover_peers", &self.failover_peers.len())
            .field("shared_networks", &self.shared_networks.len())
            .field("hosts", &self.hosts.len())
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

impl From<&DhcpPayload> for DhcpState {
    fn from(payload: &DhcpPayload) -> Self {
        let mut failover_peers = payload.failover_peers.clone();
        failover_peers.sort_by(|a, b| a.name.cmp(&b.name));
        let mut shared_networks = payload.shared_networks.clone();
        shared_networks.sort_by(|a, b| a.name.cmp(&b.name));
        let mut interfaces: Vec<String> =
            payload.interfaces.iter().map(|i| i.name.clone()).collect();
        interfaces.sort();
        let mut global_dhcp_snippets = payload.global_dhcp_snippets.clone();
        global_dhcp_snippets.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            omapi_key: payload.omapi_key.clone(),
            failover_peers,
            shared_networks,
            hosts: payload
                .hosts
                .iter()
                .map(|h| (h.mac.clone(), h.clone()))
                .collect(),
            interfaces,
            global_dhcp_snippets,
        }
    }
}

impl DhcpState {
    fn host_snippets(&self) -> Vec<&Snippet> {
        let mut all: Vec<&Snippet> = self.hosts.values().flat_map(|h| &h.dhcp_snippets).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Host reservations can be patched live through OMAPI; anything else,
    /// including host snippets, needs a daemon restart.
    pub fn requires_restart(&self, previous: &Self) -> bool {
        self.omapi_key != previous.omapi_key
            || self.failover_peers != previous.failover_peers
            || self.shared_networks != previous.shared_networks
            || self.interfaces != previous.interfaces
            || self.global_dhcp_snippets != previous.global_dhcp_snippets
            || self.host_snippets() != previous.host_snippets()
    }

    /// What changed going from `previous` to `self`.
    pub fn diff(&self, previous: &Self) -> StateDiff {
        let mut diff = StateDiff {
            requires_restart: self.requires_restart(previous),
            ..StateDiff::default()
        };
        for (mac, host) in &self.hosts {
            match previous.hosts.get(mac) {
                None => diff.hosts_added.push(host.clone()),
                Some(old) if old.ip != host.ip => diff.hosts_modified.push(host.clone()),
                Some(_) => {}
            }
        }
        diff.hosts_removed = previous
            .hosts
            .iter()
            .filter(|(mac, _)| !self.hosts.contains_key(*mac))
            .map(|(_, h)| h.clone())
            .collect();
        diff
    }
}

/// Difference between two applied states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    pub requires_restart: bool,
    pub hosts_added: Vec<HostEntry>,
    pub hosts_removed: Vec<HostEntry>,
    pub hosts_modified: Vec<HostEntry>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        !self.requires_restart
            && self.hosts_added.is_empty()
            && self.hosts_removed.is_empty()
            && self.hosts_modified.is_empty()
    }
}
