// ── Rack RPC seam ──
//
// The orchestrator talks to racks only through `RackRpc`. `RackPool` is the
// production implementation over one `RackClient` per rack; tests plug in
// in-process fakes.

use std::future::Future;

use dashmap::{DashMap, DashSet};
use futures_util::future::join_all;
use rackdhcp_api::{DhcpConfigError, DhcpPayload, IpVersion, RackClient};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::EntityId;

/// Calls the engine makes against rack controllers.
pub trait RackRpc: Send + Sync + 'static {
    /// Whether `rack` currently has a live connection.
    fn is_connected(&self, rack: EntityId) -> bool;

    /// All connected racks, in id order.
    fn connected_racks(&self) -> Vec<EntityId>;

    /// Replace the running configuration of the `version` daemon.
    fn configure_dhcp(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Check a document without applying it. Empty means valid.
    fn validate_dhcp_config(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> impl Future<Output = Result<Vec<DhcpConfigError>, CoreError>> + Send;
}

/// HTTP clients for every known rack plus their last probed liveness.
#[derive(Debug, Default)]
pub struct RackPool {
    clients: DashMap<EntityId, RackClient>,
    connected: DashSet<EntityId>,
}

impl RackPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rack. It counts as disconnected until probed.
    pub fn insert(&self, rack: EntityId, client: RackClient) {
        self.connected.remove(&rack);
        self.clients.insert(rack, client);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Ping every rack concurrently and record which ones answered.
    /// Returns the connected racks.
    pub async fn probe(&self) -> Vec<EntityId> {
        let clients: Vec<(EntityId, RackClient)> = self
            .clients
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let results = join_all(clients.into_iter().map(|(rack, client)| async move {
            let outcome = client.ping().await;
            (rack, outcome)
        }))
        .await;

        for (rack, outcome) in results {
            match outcome {
                Ok(()) => {
                    debug!(rack = %rack, "rack connected");
                    self.connected.insert(rack);
                }
                Err(e) => {
                    warn!(rack = %rack, error = %e, "rack unreachable");
                    self.connected.remove(&rack);
                }
            }
        }
        self.connected_racks()
    }

    fn client(&self, rack: EntityId) -> Result<RackClient, CoreError> {
        self.clients
            .get(&rack)
            .map(|c| c.value().clone())
            .ok_or_else(|| CoreError::RackUnavailable {
                rack,
                reason: "no endpoint configured".into(),
            })
    }
}

impl RackRpc for RackPool {
    fn is_connected(&self, rack: EntityId) -> bool {
        self.connected.contains(&rack)
    }

    fn connected_racks(&self) -> Vec<EntityId> {
        let mut racks: Vec<EntityId> = self.connected.iter().map(|r| *r).collect();
        racks.sort();
        racks
    }

    async fn configure_dhcp(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<(), CoreError> {
        let client = self.client(rack)?;
        client
            .configure_dhcp(version, payload)
            .await
            .map_err(|e| CoreError::from(e).in_context(rack, version))
    }

    async fn validate_dhcp_config(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<Vec<DhcpConfigError>, CoreError> {
        let client = self.client(rack)?;
        client
            .validate_dhcp_config(version, payload)
            .await
            .map_err(|e| CoreError::from(e).in_context(rack, version))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rackdhcp_api::TransportConfig;
    use url::Url;

    fn client(port: u16) -> RackClient {
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        RackClient::new(url, None, &TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn unprobed_racks_are_disconnected() {
        let pool = RackPool::new();
        pool.insert(EntityId::new(1), client(9));
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_connected(EntityId::new(1)));
        assert!(pool.connected_racks().is_empty());
    }

    #[tokio::test]
    async fn unknown_rack_is_unavailable() {
        let pool = RackPool::new();
        let payload = DhcpPayload {
            omapi_key: String::new(),
            failover_peers: vec![],
            shared_networks: vec![],
            hosts: vec![],
            interfaces: vec![],
            global_dhcp_snippets: vec![],
        };
        let err = pool
            .configure_dhcp(EntityId::new(7), IpVersion::V4, &payload)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("Rack 7"), "{err}");
    }

    #[tokio::test]
    async fn probe_marks_closed_port_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let pool = RackPool::new();
        pool.insert(EntityId::new(1), client(port));
        assert!(pool.probe().await.is_empty());
        assert!(!pool.is_connected(EntityId::new(1)));
    }
}
