//! Engine-level tests for the reconciliation engine, driven through fakes
//! at the registry and control-plane boundaries.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use tzsync::controlplane::{ControlPlane, TunnelZone, TunnelZoneHost};
use tzsync::error::{ControlPlaneError, RegistryError, SyncError};
use tzsync::registry::{AgentRegistry, EventStream, RegistryEvent, RegistrySnapshot};
use tzsync::sync::{catchup, member::MemberApplier, watch, zone, TunnelZoneSync};
use tzsync::types::{AgentRecord, Encapsulation, Revision};

/// Registry fake: one canned snapshot plus a scripted sequence of watch
/// events. With `hang_after_events` the stream stays pending once the
/// script is exhausted, like a real watch with nothing left to deliver.
#[derive(Default)]
struct FakeRegistry {
    snapshot: RegistrySnapshot,
    events: Mutex<Vec<Result<RegistryEvent, RegistryError>>>,
    hang_after_events: bool,
    watched_from: Mutex<Option<Revision>>,
}

impl FakeRegistry {
    fn with_snapshot(records: Vec<AgentRecord>, revision: Revision) -> Self {
        Self {
            snapshot: RegistrySnapshot { records, revision },
            ..Default::default()
        }
    }

    fn push_event(&self, records: Vec<AgentRecord>, revision: Revision) {
        self.events
            .lock()
            .unwrap()
            .push(Ok(RegistryEvent { records, revision }));
    }
}

#[async_trait]
impl AgentRegistry for FakeRegistry {
    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        Ok(self.snapshot.clone())
    }

    fn watch(&self, from: Revision) -> EventStream<'_> {
        *self.watched_from.lock().unwrap() = Some(from);
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        if self.hang_after_events {
            stream::iter(events).chain(stream::pending()).boxed()
        } else {
            stream::iter(events).boxed()
        }
    }
}

/// Control-plane fake that records every call and can be scripted to fail
/// zone creation or individual host additions.
#[derive(Default)]
struct FakeControlPlane {
    zones: Mutex<Vec<TunnelZone>>,
    hosts: Mutex<HashMap<String, Vec<TunnelZoneHost>>>,
    failing_hosts: Mutex<HashSet<String>>,
    add_calls: Mutex<Vec<(String, String)>>,
    create_calls: AtomicUsize,
    fail_create: bool,
    register_despite_failure: bool,
}

impl FakeControlPlane {
    fn with_zone(id: &str, name: &str) -> Self {
        let fake = Self::default();
        fake.zones.lock().unwrap().push(TunnelZone {
            id: id.to_string(),
            name: name.to_string(),
        });
        fake
    }

    fn seed_host(&self, zone_id: &str, host_id: &str, ip: &str) {
        self.hosts
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .push(TunnelZoneHost {
                host_id: host_id.to_string(),
                ip_address: ip.to_string(),
            });
    }

    fn fail_host(&self, host_id: &str) {
        self.failing_hosts
            .lock()
            .unwrap()
            .insert(host_id.to_string());
    }

    fn add_calls(&self) -> Vec<(String, String)> {
        self.add_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_tunnel_zones(&self) -> Result<Vec<TunnelZone>, ControlPlaneError> {
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn create_tunnel_zone(
        &self,
        name: &str,
        _encapsulation: Encapsulation,
    ) -> Result<TunnelZone, ControlPlaneError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        let zone = TunnelZone {
            id: format!("tz-{}", n),
            name: name.to_string(),
        };
        if self.fail_create {
            if self.register_despite_failure {
                self.zones.lock().unwrap().push(zone);
            }
            return Err(ControlPlaneError::Rejected {
                operation: "create tunnel zone",
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        self.zones.lock().unwrap().push(zone.clone());
        Ok(zone)
    }

    async fn get_tunnel_zone(&self, id: &str) -> Result<TunnelZone, ControlPlaneError> {
        self.zones
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .ok_or(ControlPlaneError::Rejected {
                operation: "get tunnel zone",
                status: reqwest::StatusCode::NOT_FOUND,
            })
    }

    async fn list_hosts(
        &self,
        zone: &TunnelZone,
    ) -> Result<Vec<TunnelZoneHost>, ControlPlaneError> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .get(&zone.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_host(
        &self,
        zone: &TunnelZone,
        host_id: &str,
        ip_address: &str,
    ) -> Result<(), ControlPlaneError> {
        self.add_calls
            .lock()
            .unwrap()
            .push((host_id.to_string(), ip_address.to_string()));
        if self.failing_hosts.lock().unwrap().contains(host_id) {
            return Err(ControlPlaneError::Rejected {
                operation: "add tunnel zone host",
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        self.seed_host(&zone.id, host_id, ip_address);
        Ok(())
    }
}

fn test_zone() -> TunnelZone {
    TunnelZone {
        id: "tz-0".to_string(),
        name: "default".to_string(),
    }
}

#[tokio::test]
async fn empty_registry_leaves_members_unchanged() {
    let registry = FakeRegistry::with_snapshot(vec![], 7);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let mut known = HashSet::new();

    let revision = catchup::catch_up(&registry, &applier, &test_zone(), &mut known)
        .await
        .unwrap();

    assert_eq!(revision, 7);
    assert!(known.is_empty());
    assert!(control_plane.add_calls().is_empty());
}

#[tokio::test]
async fn catch_up_adds_unknown_host() {
    let registry =
        FakeRegistry::with_snapshot(vec![AgentRecord::new("host-A", "10.0.0.1")], 12);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let mut known = HashSet::new();

    catchup::catch_up(&registry, &applier, &test_zone(), &mut known)
        .await
        .unwrap();

    assert!(known.contains("host-A"));
    assert_eq!(
        control_plane.add_calls(),
        vec![("host-A".to_string(), "10.0.0.1".to_string())]
    );
}

#[tokio::test]
async fn catch_up_skips_already_known_host() {
    let registry =
        FakeRegistry::with_snapshot(vec![AgentRecord::new("host-A", "10.0.0.1")], 12);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let mut known: HashSet<String> = ["host-A".to_string()].into_iter().collect();

    catchup::catch_up(&registry, &applier, &test_zone(), &mut known)
        .await
        .unwrap();

    assert!(known.contains("host-A"));
    assert!(control_plane.add_calls().is_empty());
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_rest() {
    let registry = FakeRegistry::with_snapshot(
        vec![
            AgentRecord::new("host-A", "10.0.0.1"),
            AgentRecord::new("host-B", "10.0.0.2"),
            AgentRecord::new("host-C", "10.0.0.3"),
        ],
        20,
    );
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    control_plane.fail_host("host-B");
    let applier = MemberApplier::new(&control_plane);
    let mut known = HashSet::new();

    catchup::catch_up(&registry, &applier, &test_zone(), &mut known)
        .await
        .unwrap();

    // all three were attempted, only the failing one is left out
    assert_eq!(control_plane.add_calls().len(), 3);
    assert!(known.contains("host-A"));
    assert!(!known.contains("host-B"));
    assert!(known.contains("host-C"));
}

#[tokio::test]
async fn same_record_across_snapshot_and_watch_is_applied_once() {
    let registry =
        FakeRegistry::with_snapshot(vec![AgentRecord::new("host-A", "10.0.0.1")], 30);
    // the snapshot-time mutation is re-delivered by the watch
    registry.push_event(vec![AgentRecord::new("host-A", "10.0.0.1")], 30);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let zone = test_zone();
    let mut known = HashSet::new();
    let stop = Notify::new();

    let revision = catchup::catch_up(&registry, &applier, &zone, &mut known)
        .await
        .unwrap();
    let result =
        watch::watch_registry(&registry, &applier, &zone, revision, &mut known, &stop).await;

    // exactly one creation call despite the duplicate delivery
    assert_eq!(control_plane.add_calls().len(), 1);
    // the scripted stream ends, which is fatal in production
    assert!(matches!(
        result,
        Err(SyncError::Registry(RegistryError::WatchFailed(_)))
    ));
}

#[tokio::test]
async fn watch_resumes_at_exactly_the_snapshot_revision() {
    let registry = FakeRegistry::with_snapshot(vec![], 41);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let zone = test_zone();
    let mut known = HashSet::new();
    let stop = Notify::new();

    let revision = catchup::catch_up(&registry, &applier, &zone, &mut known)
        .await
        .unwrap();
    let _ = watch::watch_registry(&registry, &applier, &zone, revision, &mut known, &stop).await;

    assert_eq!(*registry.watched_from.lock().unwrap(), Some(41));
}

#[tokio::test]
async fn known_event_is_skipped_and_loop_continues() {
    let registry = FakeRegistry::with_snapshot(vec![], 50);
    registry.push_event(vec![AgentRecord::new("host-A", "10.0.0.1")], 51);
    registry.push_event(vec![AgentRecord::new("host-B", "10.0.0.2")], 52);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let zone = test_zone();
    let mut known: HashSet<String> = ["host-A".to_string()].into_iter().collect();
    let stop = Notify::new();

    let _ = watch::watch_registry(&registry, &applier, &zone, 50, &mut known, &stop).await;

    // host-A was already known: no call for it, host-B still processed
    assert_eq!(
        control_plane.add_calls(),
        vec![("host-B".to_string(), "10.0.0.2".to_string())]
    );
    assert!(known.contains("host-B"));
}

#[tokio::test]
async fn failed_event_is_not_marked_known_and_next_event_is_processed() {
    let registry = FakeRegistry::with_snapshot(vec![], 60);
    registry.push_event(vec![AgentRecord::new("host-A", "10.0.0.1")], 61);
    registry.push_event(vec![AgentRecord::new("host-B", "10.0.0.2")], 62);
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    control_plane.fail_host("host-A");
    let applier = MemberApplier::new(&control_plane);
    let zone = test_zone();
    let mut known = HashSet::new();
    let stop = Notify::new();

    let _ = watch::watch_registry(&registry, &applier, &zone, 60, &mut known, &stop).await;

    assert_eq!(control_plane.add_calls().len(), 2);
    assert!(!known.contains("host-A"));
    assert!(known.contains("host-B"));
}

#[tokio::test]
async fn stop_signal_ends_the_watch_loop_cleanly() {
    let registry = FakeRegistry {
        hang_after_events: true,
        ..FakeRegistry::with_snapshot(vec![], 70)
    };
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    let applier = MemberApplier::new(&control_plane);
    let zone = test_zone();
    let mut known = HashSet::new();
    let stop = Notify::new();
    stop.notify_one();

    let result = watch::watch_registry(&registry, &applier, &zone, 70, &mut known, &stop).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn ensure_tunnel_zone_reuses_existing_zone() {
    let control_plane = FakeControlPlane::with_zone("tz-9", "edge");

    let first = zone::ensure_tunnel_zone(&control_plane, "edge", Encapsulation::Vxlan)
        .await
        .unwrap();
    let second = zone::ensure_tunnel_zone(&control_plane, "edge", Encapsulation::Vxlan)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(control_plane.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ensure_tunnel_zone_creates_once() {
    let control_plane = FakeControlPlane::default();

    let first = zone::ensure_tunnel_zone(&control_plane, "default", Encapsulation::Gre)
        .await
        .unwrap();
    let second = zone::ensure_tunnel_zone(&control_plane, "default", Encapsulation::Gre)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(control_plane.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_creation_falls_back_to_lookup() {
    // the control plane errors on create but the zone materializes anyway
    let control_plane = FakeControlPlane {
        fail_create: true,
        register_despite_failure: true,
        ..Default::default()
    };

    let resolved = zone::ensure_tunnel_zone(&control_plane, "default", Encapsulation::Vxlan)
        .await
        .unwrap();

    assert_eq!(resolved.name, "default");
}

#[tokio::test]
async fn failed_creation_without_zone_is_fatal() {
    let control_plane = FakeControlPlane {
        fail_create: true,
        ..Default::default()
    };

    let result = zone::ensure_tunnel_zone(&control_plane, "default", Encapsulation::Vxlan).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn full_run_seeds_catches_up_and_watches() {
    let registry = FakeRegistry {
        hang_after_events: true,
        ..FakeRegistry::with_snapshot(vec![AgentRecord::new("host-B", "10.0.0.2")], 80)
    };
    let control_plane = FakeControlPlane::with_zone("tz-0", "default");
    // host-A is already a member; seeding must pick it up
    control_plane.seed_host("tz-0", "host-A", "10.0.0.1");
    let control_plane = Arc::new(control_plane);

    let sync = TunnelZoneSync::new(
        Arc::new(registry),
        Arc::clone(&control_plane) as Arc<dyn ControlPlane>,
        "default",
        Encapsulation::Vxlan,
    );
    // stop immediately after the catch-up-to-watch handoff
    sync.stop_handle().notify_one();

    sync.run().await.unwrap();

    assert_eq!(
        control_plane.add_calls(),
        vec![("host-B".to_string(), "10.0.0.2".to_string())]
    );
}
