// ── Central data store ──
//
// Thread-safe, lock-free storage for every inventory entity plus the two
// records the engine itself writes: service health and the OMAPI secret.
// Each mutation publishes `DomainEvent`s on the store's broadcast bus.

use std::sync::Arc;

use base64::Engine as _;
use dashmap::DashMap;
use rackdhcp_api::IpVersion;
use rand::RngCore;
use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use super::collection::EntityCollection;
use super::inventory::Inventory;
use super::snapshot::Snapshot;
use crate::error::CoreError;
use crate::events::{DomainEvent, EVENT_CHANNEL_SIZE};
use crate::model::{
    DhcpSnippet, Entity, EntityId, Interface, IpRange, Node, ServiceHealth, ServiceStatus,
    StaticIpAddress, Subnet, Vlan,
};

/// Number of random bytes behind a generated OMAPI secret.
const OMAPI_KEY_BYTES: usize = 64;

/// Retries when a writer races a snapshot read.
const SNAPSHOT_ATTEMPTS: usize = 4;

/// Central store for all inventory entities.
///
/// Reads are wait-free; writes use fine-grained per-shard locks within
/// `DashMap`.
pub struct DataStore {
    vlans: EntityCollection<Vlan>,
    subnets: EntityCollection<Subnet>,
    ip_ranges: EntityCollection<IpRange>,
    nodes: EntityCollection<Node>,
    interfaces: EntityCollection<Interface>,
    addresses: EntityCollection<StaticIpAddress>,
    snippets: EntityCollection<DhcpSnippet>,
    service_health: DashMap<(EntityId, IpVersion), ServiceHealth>,
    /// Single-row configuration table. The entry API provides the
    /// read-or-create uniqueness guarantee.
    config: DashMap<&'static str, String>,
    events: broadcast::Sender<DomainEvent>,
}

const OMAPI_KEY: &str = "omapi_key";

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            vlans: EntityCollection::new(),
            subnets: EntityCollection::new(),
            ip_ranges: EntityCollection::new(),
            nodes: EntityCollection::new(),
            interfaces: EntityCollection::new(),
            addresses: EntityCollection::new(),
            snippets: EntityCollection::new(),
            service_health: DashMap::new(),
            config: DashMap::new(),
            events,
        }
    }

    /// Seed a store from a validated inventory. No events are published.
    pub fn from_inventory(inventory: Inventory) -> Result<Self, CoreError> {
        inventory.validate()?;
        let store = Self::new();
        for v in inventory.vlans {
            store.vlans.upsert(v);
        }
        for s in inventory.subnets {
            store.subnets.upsert(s);
        }
        for r in inventory.ip_ranges {
            store.ip_ranges.upsert(r);
        }
        for n in inventory.nodes {
            store.nodes.upsert(n);
        }
        for i in inventory.interfaces {
            store.interfaces.upsert(i);
        }
        for a in inventory.addresses {
            store.addresses.upsert(a);
        }
        for s in inventory.snippets {
            store.snippets.upsert(s);
        }
        for h in inventory.service_health {
            store.service_health.insert((h.rack_id, h.version), h);
        }
        if let Some(key) = inventory.omapi_key {
            store.config.insert(OMAPI_KEY, key);
        }
        debug!(
            vlans = store.vlans.len(),
            subnets = store.subnets.len(),
            nodes = store.nodes.len(),
            "inventory loaded"
        );
        Ok(store)
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// A consistent copy of every collection. Retries while concurrent
    /// writers move the store underneath the read.
    pub fn snapshot(&self) -> Snapshot {
        let mut attempt = 0;
        loop {
            let before = self.revision();
            let snap = Snapshot::new(
                &self.vlans.snapshot(),
                &self.subnets.snapshot(),
                &self.ip_ranges.snapshot(),
                &self.nodes.snapshot(),
                &self.interfaces.snapshot(),
                &self.addresses.snapshot(),
                &self.snippets.snapshot(),
            );
            attempt += 1;
            if self.revision() == before || attempt >= SNAPSHOT_ATTEMPTS {
                return snap;
            }
            debug!(attempt, "store changed during snapshot, retrying");
        }
    }

    /// Sum of all collection versions; changes on every entity mutation.
    pub fn revision(&self) -> u64 {
        self.vlans.version()
            + self.subnets.version()
            + self.ip_ranges.version()
            + self.nodes.version()
            + self.interfaces.version()
            + self.addresses.version()
            + self.snippets.version()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn vlan(&self, id: EntityId) -> Option<Arc<Vlan>> {
        self.vlans.get(id)
    }

    pub fn subnet(&self, id: EntityId) -> Option<Arc<Subnet>> {
        self.subnets.get(id)
    }

    pub fn node(&self, id: EntityId) -> Option<Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn snippet(&self, id: EntityId) -> Option<Arc<DhcpSnippet>> {
        self.snippets.get(id)
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn upsert_vlan(&self, vlan: Vlan) {
        let (id, dhcp_on) = (vlan.id, vlan.dhcp_on);
        let previous = self.vlans.upsert(vlan);
        let toggled = previous.as_ref().map_or(dhcp_on, |p| p.dhcp_on != dhcp_on);
        self.publish_upsert::<Vlan>(id, previous.is_none());
        if toggled {
            self.publish(DomainEvent::VlanDhcpToggled {
                vlan_id: id,
                dhcp_on,
            });
        }
    }

    pub fn upsert_subnet(&self, subnet: Subnet) {
        let id = subnet.id;
        let created = self.subnets.upsert(subnet).is_none();
        self.publish_upsert::<Subnet>(id, created);
    }

    pub fn upsert_ip_range(&self, range: IpRange) {
        let id = range.id;
        let created = self.ip_ranges.upsert(range).is_none();
        self.publish_upsert::<IpRange>(id, created);
    }

    pub fn upsert_node(&self, node: Node) {
        let id = node.id;
        let created = self.nodes.upsert(node).is_none();
        self.publish_upsert::<Node>(id, created);
    }

    pub fn upsert_interface(&self, iface: Interface) {
        let id = iface.id;
        let created = self.interfaces.upsert(iface).is_none();
        self.publish_upsert::<Interface>(id, created);
    }

    pub fn upsert_address(&self, address: StaticIpAddress) {
        let id = address.id;
        let created = self.addresses.upsert(address).is_none();
        self.publish_upsert::<StaticIpAddress>(id, created);
    }

    pub fn upsert_snippet(&self, snippet: DhcpSnippet) {
        let id = snippet.id;
        let created = self.snippets.upsert(snippet).is_none();
        self.publish_upsert::<DhcpSnippet>(id, created);
    }

    pub fn remove_vlan(&self, id: EntityId) -> Option<Arc<Vlan>> {
        self.removed(self.vlans.remove(id))
    }

    pub fn remove_subnet(&self, id: EntityId) -> Option<Arc<Subnet>> {
        self.removed(self.subnets.remove(id))
    }

    pub fn remove_ip_range(&self, id: EntityId) -> Option<Arc<IpRange>> {
        self.removed(self.ip_ranges.remove(id))
    }

    pub fn remove_node(&self, id: EntityId) -> Option<Arc<Node>> {
        self.removed(self.nodes.remove(id))
    }

    pub fn remove_interface(&self, id: EntityId) -> Option<Arc<Interface>> {
        self.removed(self.interfaces.remove(id))
    }

    pub fn remove_address(&self, id: EntityId) -> Option<Arc<StaticIpAddress>> {
        self.removed(self.addresses.remove(id))
    }

    pub fn remove_snippet(&self, id: EntityId) -> Option<Arc<DhcpSnippet>> {
        self.removed(self.snippets.remove(id))
    }

    // ── Service health ───────────────────────────────────────────────

    /// Current record, or an `unknown` placeholder if never written.
    pub fn service_health(&self, rack: EntityId, version: IpVersion) -> ServiceHealth {
        self.service_health
            .get(&(rack, version))
            .map_or_else(|| ServiceHealth::unknown(rack, version), |r| r.value().clone())
    }

    /// Write a health record, creating it on first use. Publishes
    /// `ServiceStatusChanged` when the status moves.
    pub fn set_service_health(
        &self,
        rack: EntityId,
        version: IpVersion,
        status: ServiceStatus,
        status_info: impl Into<String>,
    ) {
        let status_info = status_info.into();
        let previous = {
            let mut entry = self
                .service_health
                .entry((rack, version))
                .or_insert_with(|| ServiceHealth::unknown(rack, version));
            let previous = entry.status;
            entry.status = status;
            entry.status_info = status_info;
            previous
        };
        if previous != status {
            info!(rack = %rack, version = %version, from = %previous, to = %status, "dhcp service status changed");
            self.publish(DomainEvent::ServiceStatusChanged {
                rack_id: rack,
                version,
                status,
            });
        }
    }

    // ── OMAPI secret ─────────────────────────────────────────────────

    /// The fleet-wide OMAPI shared secret, generated and stored on first use.
    pub fn omapi_key(&self) -> SecretString {
        let mut generated = false;
        let key = self
            .config
            .entry(OMAPI_KEY)
            .or_insert_with(|| {
                generated = true;
                generate_omapi_key()
            })
            .value()
            .clone();
        if generated {
            info!("generated new OMAPI key");
            self.publish(DomainEvent::OmapiKeyGenerated);
        }
        SecretString::from(key)
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// Event bus as a `Stream`; lagging surfaces as an error item.
    pub fn event_stream(&self) -> BroadcastStream<DomainEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    fn publish(&self, event: DomainEvent) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    fn publish_upsert<T: Entity>(&self, id: EntityId, created: bool) {
        let kind = T::KIND;
        self.publish(if created {
            DomainEvent::Created { kind, id }
        } else {
            DomainEvent::Updated { kind, id }
        });
    }

    fn removed<T: Entity>(&self, removed: Option<Arc<T>>) -> Option<Arc<T>> {
        if let Some(entity) = &removed {
            self.publish(DomainEvent::Deleted {
                kind: T::KIND,
                id: entity.id(),
            });
        }
        removed
    }
}

fn generate_omapi_key() -> String {
    let mut bytes = [0u8; OMAPI_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use secrecy::ExposeSecret;

    fn vlan(id: u64, dhcp_on: bool) -> Vlan {
        Vlan {
            id: EntityId::new(id),
            vid: 0,
            name: None,
            fabric_id: EntityId::new(1),
            mtu: 1500,
            dhcp_on,
            primary_rack: None,
            secondary_rack: None,
            space_id: None,
            relay_vlan: None,
        }
    }

    #[test]
    fn omapi_key_is_generated_once() {
        let store = DataStore::new();
        let mut rx = store.subscribe();
        let first = store.omapi_key();
        let second = store.omapi_key();
        assert_eq!(first.expose_secret(), second.expose_secret());

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(first.expose_secret())
            .unwrap();
        assert_eq!(decoded.len(), OMAPI_KEY_BYTES);

        assert_eq!(rx.try_recv().unwrap(), DomainEvent::OmapiKeyGenerated);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn persisted_omapi_key_is_reused() {
        let inventory = Inventory {
            omapi_key: Some("c2VjcmV0".into()),
            ..Inventory::default()
        };
        let store = DataStore::from_inventory(inventory).unwrap();
        assert_eq!(store.omapi_key().expose_secret(), "c2VjcmV0");
    }

    #[test]
    fn vlan_updates_publish_derived_toggle() {
        let store = DataStore::new();
        let mut rx = store.subscribe();

        store.upsert_vlan(vlan(5, false));
        store.upsert_vlan(vlan(5, true));
        store.upsert_vlan(vlan(5, true));

        let id = EntityId::new(5);
        let kind = EntityKind::Vlan;
        assert_eq!(rx.try_recv().unwrap(), DomainEvent::Created { kind, id });
        assert_eq!(rx.try_recv().unwrap(), DomainEvent::Updated { kind, id });
        assert_eq!(
            rx.try_recv().unwrap(),
            DomainEvent::VlanDhcpToggled {
                vlan_id: id,
                dhcp_on: true
            }
        );
        assert_eq!(rx.try_recv().unwrap(), DomainEvent::Updated { kind, id });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn remove_publishes_deleted_only_when_present() {
        let store = DataStore::new();
        store.upsert_vlan(vlan(1, false));
        let mut rx = store.subscribe();
        assert!(store.remove_vlan(EntityId::new(1)).is_some());
        assert!(store.remove_vlan(EntityId::new(1)).is_none());
        assert_eq!(
            rx.try_recv().unwrap(),
            DomainEvent::Deleted {
                kind: EntityKind::Vlan,
                id: EntityId::new(1)
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn service_health_is_created_on_first_write() {
        let store = DataStore::new();
        let rack = EntityId::new(3);
        assert_eq!(store.service_health(rack, IpVersion::V4).status, ServiceStatus::Unknown);

        let mut rx = store.subscribe();
        store.set_service_health(rack, IpVersion::V4, ServiceStatus::Dead, "boom");
        store.set_service_health(rack, IpVersion::V4, ServiceStatus::Dead, "boom again");

        let health = store.service_health(rack, IpVersion::V4);
        assert_eq!(health.status, ServiceStatus::Dead);
        assert_eq!(health.status_info, "boom again");
        assert!(matches!(rx.try_recv().unwrap(), DomainEvent::ServiceStatusChanged { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn snapshot_is_ordered_and_indexed() {
        let store = DataStore::new();
        store.upsert_vlan(vlan(9, true));
        store.upsert_vlan(vlan(2, true));
        let snap = store.snapshot();
        let ids: Vec<u64> = snap.vlans().map(|v| v.id.get()).collect();
        assert_eq!(ids, vec![2, 9]);
        assert!(snap.vlan(EntityId::new(9)).is_some());
    }
}
