#![allow(clippy::unwrap_used)]
// End-to-end tests for `DhcpEngine` over an in-process rack fake.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rackdhcp_api::FailoverMode;
use rackdhcp_core::{
    CoreError, DataStore, DhcpConfigError, DhcpEngine, DhcpPayload, DhcpSnippet, EngineSettings,
    EntityId, Inventory, IpVersion, RackRpc, ServiceStatus, SnippetScope,
};

// ── Fake rack fleet ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Call {
    rack: EntityId,
    version: IpVersion,
    validate: bool,
    payload: DhcpPayload,
}

#[derive(Default)]
struct FakeRacks {
    connected: Mutex<BTreeSet<EntityId>>,
    failures: Mutex<HashMap<IpVersion, String>>,
    hang: Mutex<bool>,
    validation_errors: Mutex<Vec<DhcpConfigError>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRacks {
    fn connect(&self, rack: u64) {
        self.connected.lock().unwrap().insert(EntityId::new(rack));
    }

    fn fail(&self, version: IpVersion, message: &str) {
        self.failures.lock().unwrap().insert(version, message.into());
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, rack: EntityId, version: IpVersion, validate: bool, payload: &DhcpPayload) {
        self.calls.lock().unwrap().push(Call {
            rack,
            version,
            validate,
            payload: payload.clone(),
        });
    }
}

impl RackRpc for FakeRacks {
    fn is_connected(&self, rack: EntityId) -> bool {
        self.connected.lock().unwrap().contains(&rack)
    }

    fn connected_racks(&self) -> Vec<EntityId> {
        self.connected.lock().unwrap().iter().copied().collect()
    }

    async fn configure_dhcp(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<(), CoreError> {
        self.record(rack, version, false, payload);
        if *self.hang.lock().unwrap() {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match self.failures.lock().unwrap().get(&version) {
            Some(message) => Err(CoreError::RemoteConfiguration {
                version,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn validate_dhcp_config(
        &self,
        rack: EntityId,
        version: IpVersion,
        payload: &DhcpPayload,
    ) -> Result<Vec<DhcpConfigError>, CoreError> {
        self.record(rack, version, true, payload);
        Ok(self.validation_errors.lock().unwrap().clone())
    }
}

// ── Inventory ───────────────────────────────────────────────────────

const RACK_1: EntityId = EntityId::new(1);
const RACK_2: EntityId = EntityId::new(2);
const RACK_3: EntityId = EntityId::new(4);

// rack-1 is primary and rack-2 secondary for vlan 10. rack-3 only has an
// address on the vlan. node-1 boots from vlan 10.
const INVENTORY: &str = r"
nodes:
  - { id: 1, hostname: rack-1, node_type: rack_controller }
  - { id: 2, hostname: rack-2, node_type: rack_controller }
  - { id: 3, hostname: node-1, boot_interface_id: 42 }
  - { id: 4, hostname: rack-3, node_type: rack_controller }
vlans:
  - { id: 10, fabric_id: 1, dhcp_on: true, primary_rack: 1, secondary_rack: 2 }
subnets:
  - { id: 20, cidr: 10.0.0.0/24, gateway_ip: 10.0.0.1, vlan_id: 10 }
ip_ranges:
  - { id: 30, subnet_id: 20, start_ip: 10.0.0.100, end_ip: 10.0.0.200, type: dynamic }
interfaces:
  - { id: 40, name: eth0, mac: '52:54:00:00:00:01', vlan_id: 10, node_id: 1 }
  - { id: 41, name: eth0, mac: '52:54:00:00:00:02', vlan_id: 10, node_id: 2 }
  - { id: 42, name: eth0, mac: '52:54:00:00:00:03', vlan_id: 10, node_id: 3 }
  - { id: 43, name: eth1, mac: '52:54:00:00:00:04', vlan_id: 10, node_id: 4 }
addresses:
  - { id: 50, ip: 10.0.0.2, alloc_type: sticky, subnet_id: 20, interface_id: 40 }
  - { id: 51, ip: 10.0.0.3, alloc_type: sticky, subnet_id: 20, interface_id: 41 }
  - { id: 52, ip: 10.0.0.50, alloc_type: sticky, subnet_id: 20, interface_id: 42 }
  - { id: 53, ip: 10.0.0.4, alloc_type: sticky, subnet_id: 20, interface_id: 43 }
snippets:
  - { id: 60, name: global-opts, value: 'option ntp-servers 10.0.0.1;' }
";

fn setup() -> (DhcpEngine<FakeRacks>, Arc<FakeRacks>) {
    let inventory = Inventory::from_yaml(INVENTORY).unwrap();
    let store = Arc::new(DataStore::from_inventory(inventory).unwrap());
    let racks = Arc::new(FakeRacks::default());
    let settings = EngineSettings {
        rpc_timeout: Duration::from_secs(5),
        ..EngineSettings::default()
    };
    (DhcpEngine::new(store, Arc::clone(&racks), settings), racks)
}

fn snippet(id: u64, name: &str, scope: SnippetScope, enabled: bool) -> DhcpSnippet {
    DhcpSnippet {
        id: EntityId::new(id),
        name: name.into(),
        description: String::new(),
        value: "option domain-search \"example.com\";".into(),
        enabled,
        scope,
    }
}

fn config_error(text: &str) -> DhcpConfigError {
    DhcpConfigError {
        error: text.into(),
        line_num: Some(12),
        line: Some("option bogus;".into()),
        position: Some("^".into()),
    }
}

// ── Apply ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_records_running_and_off() {
    let (engine, racks) = setup();
    racks.connect(1);

    engine.configure_dhcp(RACK_1).await.unwrap();

    let calls = racks.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.rack == RACK_1 && !c.validate));

    let store = engine.store();
    let v4 = store.service_health(RACK_1, IpVersion::V4);
    assert_eq!(v4.status, ServiceStatus::Running);
    assert_eq!(v4.status_info, "");
    let v6 = store.service_health(RACK_1, IpVersion::V6);
    assert_eq!(v6.status, ServiceStatus::Off);
    assert_eq!(v6.status_info, "");

    assert!(engine.last_applied(RACK_1, IpVersion::V4).is_some());
}

#[tokio::test]
async fn test_applied_document_reserves_hosts() {
    let (engine, racks) = setup();
    racks.connect(1);

    engine.configure_dhcp(RACK_1).await.unwrap();

    let v4 = racks
        .calls()
        .into_iter()
        .find(|c| c.version == IpVersion::V4)
        .unwrap();
    assert_eq!(v4.payload.failover_peers.len(), 1);
    assert_eq!(v4.payload.failover_peers[0].mode, FailoverMode::Primary);
    assert_eq!(v4.payload.interfaces[0].name, "eth0");
    let node = v4
        .payload
        .hosts
        .iter()
        .find(|h| h.host == "node-1-eth0")
        .unwrap();
    assert_eq!(node.ip, "10.0.0.50");
    assert_eq!(v4.payload.global_dhcp_snippets[0].name, "global-opts");
}

#[tokio::test]
async fn test_unreachable_rack_fails_fast() {
    let (engine, racks) = setup();

    let err = engine.configure_dhcp(RACK_1).await.unwrap_err();

    assert!(err.is_unavailable(), "{err}");
    assert!(racks.calls().is_empty());
    let health = engine.store().service_health(RACK_1, IpVersion::V4);
    assert_eq!(health.status, ServiceStatus::Unknown);
}

#[tokio::test]
async fn test_partial_failure_writes_both_statuses() {
    let (engine, racks) = setup();
    racks.connect(1);
    racks.fail(IpVersion::V4, "dhcpd exited with status 1");

    let err = engine.configure_dhcp(RACK_1).await.unwrap_err();

    assert!(matches!(err, CoreError::RemoteConfiguration { .. }), "{err}");
    assert_eq!(racks.calls().len(), 2);
    let v4 = engine.store().service_health(RACK_1, IpVersion::V4);
    assert_eq!(v4.status, ServiceStatus::Dead);
    assert_eq!(v4.status_info, "dhcpd exited with status 1");
    let v6 = engine.store().service_health(RACK_1, IpVersion::V6);
    assert_eq!(v6.status, ServiceStatus::Off);
    assert!(engine.last_applied(RACK_1, IpVersion::V4).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hung_rack_times_out() {
    let (engine, racks) = setup();
    racks.connect(1);
    *racks.hang.lock().unwrap() = true;

    let err = engine.configure_dhcp(RACK_1).await.unwrap_err();

    assert!(matches!(err, CoreError::RemoteTimeout { timeout_secs: 5 }), "{err}");
    let v4 = engine.store().service_health(RACK_1, IpVersion::V4);
    assert_eq!(v4.status, ServiceStatus::Dead);
}

#[tokio::test]
async fn test_recovery_moves_dead_to_running() {
    let (engine, racks) = setup();
    racks.connect(1);
    racks.fail(IpVersion::V4, "boom");
    let _ = engine.configure_dhcp(RACK_1).await;
    racks.failures.lock().unwrap().clear();

    let mut events = engine.store().subscribe();
    engine.configure_dhcp(RACK_1).await.unwrap();

    let v4 = engine.store().service_health(RACK_1, IpVersion::V4);
    assert_eq!(v4.status, ServiceStatus::Running);
    assert_eq!(v4.status_info, "");
    let event = events.recv().await.unwrap();
    assert!(!event.affects_configuration());
}

#[tokio::test]
async fn test_vlan_without_rack_interface_is_skipped() {
    let (engine, racks) = setup();
    racks.connect(1);
    engine.store().remove_address(EntityId::new(50));

    engine.configure_dhcp(RACK_1).await.unwrap();

    let calls = racks.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.payload.shared_networks.is_empty()));
    let v4 = engine.store().service_health(RACK_1, IpVersion::V4);
    assert_eq!(v4.status, ServiceStatus::Off);
    assert_eq!(v4.status_info, "");
}

// ── Validate ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_subnet_snippet_on_primary() {
    let (engine, racks) = setup();
    racks.connect(1);
    racks.connect(2);

    let errors = engine
        .validate_dhcp_config(snippet(
            70,
            "subnet-opts",
            SnippetScope::Subnet {
                subnet_id: EntityId::new(20),
            },
            true,
        ))
        .await
        .unwrap();

    assert!(errors.is_empty());
    let calls = racks.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.rack == RACK_1 && c.validate));
    let v4 = calls.iter().find(|c| c.version == IpVersion::V4).unwrap();
    let fragment = &v4.payload.shared_networks[0].subnets[0];
    assert!(fragment.dhcp_snippets.iter().any(|s| s.name == "subnet-opts"));
}

#[tokio::test]
async fn test_validate_falls_back_to_secondary() {
    let (engine, racks) = setup();
    racks.connect(2);

    engine
        .validate_dhcp_config(snippet(
            70,
            "node-opts",
            SnippetScope::Node {
                node_id: EntityId::new(3),
            },
            true,
        ))
        .await
        .unwrap();

    assert!(racks.calls().iter().all(|c| c.rack == RACK_2));
}

#[tokio::test]
async fn test_validate_falls_back_to_rack_with_address() {
    let (engine, racks) = setup();
    racks.connect(4);

    engine
        .validate_dhcp_config(snippet(
            70,
            "subnet-opts",
            SnippetScope::Subnet {
                subnet_id: EntityId::new(20),
            },
            true,
        ))
        .await
        .unwrap();

    let calls = racks.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.rack == RACK_3));
}

#[tokio::test]
async fn test_validate_without_connected_rack_fails() {
    let (engine, racks) = setup();

    let err = engine
        .validate_dhcp_config(snippet(70, "g", SnippetScope::Global, true))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err}");
    assert!(racks.calls().is_empty());
}

#[tokio::test]
async fn test_validate_without_rack_serving_vlan_fails() {
    let (engine, racks) = setup();
    racks.connect(4);
    engine.store().remove_address(EntityId::new(53));

    let err = engine
        .validate_dhcp_config(snippet(
            70,
            "subnet-opts",
            SnippetScope::Subnet {
                subnet_id: EntityId::new(20),
            },
            true,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err}");
    assert!(racks.calls().is_empty());
}

#[tokio::test]
async fn test_validate_node_without_boot_interface_fails() {
    let (engine, racks) = setup();
    racks.connect(1);

    let err = engine
        .validate_dhcp_config(snippet(
            70,
            "node-opts",
            SnippetScope::Node { node_id: RACK_3 },
            true,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err}");
    assert!(err.to_string().contains("rack-3"), "{err}");
    assert!(racks.calls().is_empty());
}

#[tokio::test]
async fn test_validate_includes_disabled_snippet() {
    let (engine, racks) = setup();
    racks.connect(1);

    engine
        .validate_dhcp_config(snippet(71, "draft", SnippetScope::Global, false))
        .await
        .unwrap();

    for call in racks.calls() {
        let names: Vec<&str> = call
            .payload
            .global_dhcp_snippets
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["global-opts", "draft"]);
    }
    // The store itself is untouched.
    assert!(engine.store().snippet(EntityId::new(71)).is_none());
}

#[tokio::test]
async fn test_validate_dedups_errors_across_families() {
    let (engine, racks) = setup();
    racks.connect(1);
    *racks.validation_errors.lock().unwrap() =
        vec![config_error("bad option"), config_error("bad option")];

    let errors = engine
        .validate_dhcp_config(snippet(70, "g", SnippetScope::Global, true))
        .await
        .unwrap();

    assert_eq!(errors, vec![config_error("bad option")]);
}

#[tokio::test]
async fn test_validate_current_configuration() {
    let (engine, racks) = setup();
    racks.connect(1);

    let errors = engine.validate_configuration(RACK_1).await.unwrap();
    assert!(errors.is_empty());
    assert!(racks.calls().iter().all(|c| c.rack == RACK_1 && c.validate));

    let err = engine.validate_configuration(RACK_2).await.unwrap_err();
    assert!(err.is_unavailable(), "{err}");
}

// ── Auto-configure ──────────────────────────────────────────────────

#[tokio::test]
async fn test_auto_configure_reacts_to_store_changes() {
    let (engine, racks) = setup();
    racks.connect(1);
    engine.spawn_auto_configure().await;

    let mut subnet = (*engine.store().subnet(EntityId::new(20)).unwrap()).clone();
    subnet.dns_servers = vec!["10.0.0.53".parse().unwrap()];
    engine.store().upsert_subnet(subnet);

    tokio::time::timeout(Duration::from_secs(5), async {
        while racks.calls().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    engine.shutdown().await;

    let calls = racks.calls();
    assert!(calls.iter().all(|c| c.rack == RACK_1));
    let v4 = calls.iter().find(|c| c.version == IpVersion::V4).unwrap();
    assert_eq!(
        v4.payload.shared_networks[0].subnets[0].dns_servers,
        vec!["10.0.0.53".parse::<IpAddr>().unwrap()]
    );
}
