// ── DHCP engine facade ──
//
// Synthesizes configuration from the store, pushes it to racks, validates
// candidate snippets, and optionally keeps racks in sync by reacting to
// store events in a background task.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexSet;
use rackdhcp_api::{DhcpConfigError, IpVersion};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{self, DhcpConfiguration};
use crate::diff::DhcpState;
use crate::error::CoreError;
use crate::events::DomainEvent;
use crate::model::{DhcpSnippet, EntityId, EntityKind, ServiceStatus, SnippetScope};
use crate::rpc::RackRpc;
use crate::settings::EngineSettings;
use crate::store::{DataStore, Snapshot};
use crate::topology;

/// Main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Owns no inventory itself: reads come from
/// the shared `DataStore`, rack calls go through `R`.
pub struct DhcpEngine<R: RackRpc> {
    inner: Arc<EngineInner<R>>,
}

impl<R: RackRpc> Clone for DhcpEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<R> {
    store: Arc<DataStore>,
    rpc: Arc<R>,
    settings: EngineSettings,
    last_applied: DashMap<(EntityId, IpVersion), DhcpState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: RackRpc> DhcpEngine<R> {
    pub fn new(store: Arc<DataStore>, rpc: Arc<R>, settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                rpc,
                settings,
                last_applied: DashMap::new(),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn rpc(&self) -> &Arc<R> {
        &self.inner.rpc
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    // ── Synthesis ────────────────────────────────────────────────────

    /// The configuration `rack` should run right now.
    pub fn configuration(&self, rack: EntityId) -> Result<DhcpConfiguration, CoreError> {
        let snap = self.inner.store.snapshot();
        self.configuration_from(&snap, rack)
    }

    fn configuration_from(
        &self,
        snap: &Snapshot,
        rack: EntityId,
    ) -> Result<DhcpConfiguration, CoreError> {
        assembler::get_dhcp_configuration(
            snap,
            rack,
            &self.inner.settings,
            self.inner.store.omapi_key(),
        )
    }

    /// Document last accepted by `rack` for `version`, if any.
    pub fn last_applied(&self, rack: EntityId, version: IpVersion) -> Option<DhcpState> {
        self.inner
            .last_applied
            .get(&(rack, version))
            .map(|s| s.value().clone())
    }

    // ── Apply ────────────────────────────────────────────────────────

    /// Push the current configuration to both daemons on `rack`.
    ///
    /// Both families are attempted even if one fails; service health is
    /// written for each before the first error is returned. A rack that is
    /// not connected fails fast and its health records are left alone.
    pub async fn configure_dhcp(&self, rack: EntityId) -> Result<(), CoreError> {
        if !self.inner.rpc.is_connected(rack) {
            return Err(CoreError::RackUnavailable {
                rack,
                reason: "no live connection".into(),
            });
        }
        let config = self.configuration(rack)?;
        let (v4, v6) = tokio::join!(
            self.push(rack, &config, IpVersion::V4),
            self.push(rack, &config, IpVersion::V6),
        );
        v4.and(v6)
    }

    async fn push(
        &self,
        rack: EntityId,
        config: &DhcpConfiguration,
        version: IpVersion,
    ) -> Result<(), CoreError> {
        let payload = config.payload(version);
        debug!(rack = %rack, version = %version, "pushing dhcp configuration");
        let result = self
            .bounded(self.inner.rpc.configure_dhcp(rack, version, &payload))
            .await;
        let store = &self.inner.store;

        match &result {
            Ok(()) => {
                let status = if config.family(version).is_empty() {
                    ServiceStatus::Off
                } else {
                    ServiceStatus::Running
                };
                store.set_service_health(rack, version, status, "");
                let state = DhcpState::from(&payload);
                if let Some(previous) = self.inner.last_applied.insert((rack, version), state.clone()) {
                    let diff = state.diff(&previous);
                    debug!(
                        rack = %rack,
                        version = %version,
                        requires_restart = diff.requires_restart,
                        hosts_added = diff.hosts_added.len(),
                        hosts_removed = diff.hosts_removed.len(),
                        hosts_modified = diff.hosts_modified.len(),
                        "dhcp state changed"
                    );
                }
                info!(rack = %rack, version = %version, "dhcp configuration applied");
            }
            Err(e) if e.is_unavailable() => {
                warn!(rack = %rack, version = %version, error = %e, "rack dropped during apply");
            }
            Err(e) => {
                warn!(rack = %rack, version = %version, error = %e, "dhcp configuration failed");
                // The daemon's own words, without our prefix.
                let info = match &e {
                    CoreError::RemoteConfiguration { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                store.set_service_health(rack, version, ServiceStatus::Dead, info);
            }
        }
        result
    }

    // ── Validate ─────────────────────────────────────────────────────

    /// Check the configuration that would result from saving `snippet`.
    ///
    /// The snippet is overlaid (forced enabled) onto the current state and
    /// both families are validated on a connected rack serving it. Errors
    /// are de-duplicated, first occurrence kept.
    pub async fn validate_dhcp_config(
        &self,
        snippet: DhcpSnippet,
    ) -> Result<Vec<DhcpConfigError>, CoreError> {
        let mut snap = self.inner.store.snapshot();
        let rack = self.validation_rack(&snap, &snippet)?;
        debug!(rack = %rack, snippet = %snippet.name, "validating snippet");
        snap.overlay_snippet(snippet);
        let config = self.configuration_from(&snap, rack)?;
        self.validate_on(rack, &config).await
    }

    /// Check the configuration `rack` should run right now, without
    /// applying it.
    pub async fn validate_configuration(
        &self,
        rack: EntityId,
    ) -> Result<Vec<DhcpConfigError>, CoreError> {
        if !self.inner.rpc.is_connected(rack) {
            return Err(CoreError::RackUnavailable {
                rack,
                reason: "no live connection".into(),
            });
        }
        let config = self.configuration(rack)?;
        self.validate_on(rack, &config).await
    }

    async fn validate_on(
        &self,
        rack: EntityId,
        config: &DhcpConfiguration,
    ) -> Result<Vec<DhcpConfigError>, CoreError> {
        let v4_payload = config.payload(IpVersion::V4);
        let v6_payload = config.payload(IpVersion::V6);
        let rpc = &self.inner.rpc;
        let (v4, v6) = tokio::join!(
            self.bounded(rpc.validate_dhcp_config(rack, IpVersion::V4, &v4_payload)),
            self.bounded(rpc.validate_dhcp_config(rack, IpVersion::V6, &v6_payload)),
        );

        let mut errors = IndexSet::new();
        errors.extend(v4?);
        errors.extend(v6?);
        Ok(errors.into_iter().collect())
    }

    /// Rack that should check `snippet`: the primary of the VLAN it
    /// affects, else the secondary, else any connected rack with an
    /// address there. Global snippets go to the first connected rack.
    fn validation_rack(&self, snap: &Snapshot, snippet: &DhcpSnippet) -> Result<EntityId, CoreError> {
        let rpc = &self.inner.rpc;
        let (vlan_id, versions) = match snippet.scope {
            SnippetScope::Global => {
                return rpc.connected_racks().first().copied().ok_or_else(|| {
                    CoreError::ValidationFailed {
                        message: "no connected rack controller can validate the snippet".into(),
                    }
                });
            }
            SnippetScope::Subnet { subnet_id } => {
                let subnet = snap
                    .subnet(subnet_id)
                    .ok_or_else(|| CoreError::not_found("subnet", subnet_id))?;
                (subnet.vlan_id, vec![subnet.version()])
            }
            SnippetScope::Node { node_id } => {
                let node = snap
                    .node(node_id)
                    .ok_or_else(|| CoreError::not_found("node", node_id))?;
                let vlan_id = node
                    .boot_interface_id
                    .and_then(|i| snap.interface(i))
                    .and_then(|i| i.vlan_id)
                    .ok_or_else(|| CoreError::ValidationFailed {
                        message: format!("node {} has no boot interface on a vlan", node.hostname),
                    })?;
                (vlan_id, vec![IpVersion::V4, IpVersion::V6])
            }
        };

        let vlan = snap
            .vlan(vlan_id)
            .ok_or_else(|| CoreError::not_found("vlan", vlan_id))?;
        if let Some(rack) = [vlan.primary_rack, vlan.secondary_rack]
            .into_iter()
            .flatten()
            .find(|r| rpc.is_connected(*r))
        {
            return Ok(rack);
        }
        rpc.connected_racks()
            .into_iter()
            .find(|rack| {
                versions.iter().any(|v| {
                    !topology::interfaces_with_ip_on_vlan(snap, *rack, vlan_id, *v).is_empty()
                })
            })
            .ok_or_else(|| CoreError::ValidationFailed {
                message: format!("no connected rack controller serves vlan {vlan_id}"),
            })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        let timeout = self.inner.settings.rpc_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(CoreError::RemoteTimeout {
                timeout_secs: timeout.as_secs(),
            }))
    }

    // ── Auto-configure ───────────────────────────────────────────────

    /// Start re-applying configuration whenever store events touch a
    /// rack's inputs. Runs until [`shutdown`](Self::shutdown).
    pub async fn spawn_auto_configure(&self) {
        let engine = self.clone();
        let cancel = self.inner.cancel.clone();
        let events = self.inner.store.event_stream();
        let handle = tokio::spawn(auto_configure_task(engine, events, cancel));
        self.inner.task_handles.lock().await.push(handle);
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("dhcp engine stopped");
    }

    /// Racks whose configuration may change because of `event`.
    pub fn affected_racks(&self, event: &DomainEvent) -> BTreeSet<EntityId> {
        let snap = self.inner.store.snapshot();
        affected_racks(&snap, event)
    }
}

// ── Event fan-out ────────────────────────────────────────────────────

fn racks_of_vlan(snap: &Snapshot, vlan_id: EntityId, out: &mut BTreeSet<EntityId>) {
    for id in topology::related_vlans(snap, vlan_id) {
        if let Some(vlan) = snap.vlan(id) {
            out.extend(vlan.primary_rack);
            out.extend(vlan.secondary_rack);
        }
    }
}

fn racks_of_node(snap: &Snapshot, node_id: EntityId, out: &mut BTreeSet<EntityId>) {
    if snap.node(node_id).is_some_and(|n| n.node_type.is_rack()) {
        out.insert(node_id);
    }
    for iface in snap.interfaces_of_node(node_id) {
        if let Some(vlan) = iface.vlan_id {
            racks_of_vlan(snap, vlan, out);
        }
    }
}

fn racks_of_subnet(snap: &Snapshot, subnet_id: EntityId, out: &mut BTreeSet<EntityId>) {
    if let Some(subnet) = snap.subnet(subnet_id) {
        racks_of_vlan(snap, subnet.vlan_id, out);
    }
}

fn all_racks(snap: &Snapshot) -> BTreeSet<EntityId> {
    snap.racks().map(|r| r.id).collect()
}

/// Resolve an event to the racks it can affect. Deletions fan out to every
/// rack since the removed row can no longer be traced.
pub fn affected_racks(snap: &Snapshot, event: &DomainEvent) -> BTreeSet<EntityId> {
    let mut out = BTreeSet::new();
    match event {
        DomainEvent::Deleted { .. } => return all_racks(snap),
        DomainEvent::VlanDhcpToggled { vlan_id, .. } => racks_of_vlan(snap, *vlan_id, &mut out),
        DomainEvent::Created { kind, id } | DomainEvent::Updated { kind, id } => match kind {
            EntityKind::Vlan => racks_of_vlan(snap, *id, &mut out),
            EntityKind::Subnet => racks_of_subnet(snap, *id, &mut out),
            EntityKind::IpRange => {
                if let Some(range) = snap.ip_range(*id) {
                    racks_of_subnet(snap, range.subnet_id, &mut out);
                }
            }
            EntityKind::Node => racks_of_node(snap, *id, &mut out),
            EntityKind::Interface => {
                if let Some(iface) = snap.interface(*id) {
                    if let Some(node) = iface.node_id {
                        racks_of_node(snap, node, &mut out);
                    }
                    if let Some(vlan) = iface.vlan_id {
                        racks_of_vlan(snap, vlan, &mut out);
                    }
                }
            }
            EntityKind::StaticIpAddress => {
                if let Some(address) = snap.address(*id) {
                    if let Some(subnet) = address.subnet_id {
                        racks_of_subnet(snap, subnet, &mut out);
                    }
                    if let Some(node) = address
                        .interface_id
                        .and_then(|i| snap.interface(i))
                        .and_then(|i| i.node_id)
                    {
                        racks_of_node(snap, node, &mut out);
                    }
                }
            }
            EntityKind::DhcpSnippet => match snap.snippet(*id).map(|s| s.scope) {
                Some(SnippetScope::Global) | None => return all_racks(snap),
                Some(SnippetScope::Subnet { subnet_id }) => {
                    racks_of_subnet(snap, subnet_id, &mut out);
                }
                Some(SnippetScope::Node { node_id }) => racks_of_node(snap, node_id, &mut out),
            },
        },
        DomainEvent::ServiceStatusChanged { .. } | DomainEvent::OmapiKeyGenerated => {}
    }
    out
}

// ── Background tasks ─────────────────────────────────────────────────

async fn auto_configure_task<R: RackRpc>(
    engine: DhcpEngine<R>,
    mut events: BroadcastStream<DomainEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = events.next() => {
                let Some(item) = item else { break };
                let racks = match item {
                    Ok(event) if !event.affects_configuration() => continue,
                    Ok(event) => engine.affected_racks(&event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream lagged, reconfiguring every rack");
                        all_racks(&engine.inner.store.snapshot())
                    }
                };
                for rack in racks {
                    if !engine.inner.rpc.is_connected(rack) {
                        debug!(rack = %rack, "skipping disconnected rack");
                        continue;
                    }
                    if let Err(e) = engine.configure_dhcp(rack).await {
                        warn!(rack = %rack, error = %e, "automatic dhcp configuration failed");
                    }
                }
            }
        }
    }
}
