//! The reconciliation engine.
//!
//! Two phases, run sequentially on one logical thread of control: a
//! snapshot catch-up that brings the tunnel zone up to date with the
//! registry's current contents, then an infinite watch loop that applies
//! every subsequent registration. The handoff carries the snapshot revision
//! forward so no mutation is lost between the two. There is no transition
//! back; membership only ever grows (agent removal is not handled).

pub mod catchup;
pub mod member;
pub mod watch;
pub mod zone;

pub use member::{ApplyOutcome, MemberApplier};

use crate::controlplane::ControlPlane;
use crate::error::SyncError;
use crate::registry::AgentRegistry;
use crate::types::Encapsulation;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Orchestrates one synchronization run: resolve the tunnel zone, seed the
/// known-members set from its actual membership, catch up with the registry
/// snapshot, then watch forever.
pub struct TunnelZoneSync {
    registry: Arc<dyn AgentRegistry>,
    control_plane: Arc<dyn ControlPlane>,
    tunnel_zone: String,
    encapsulation: Encapsulation,
    stop: Arc<Notify>,
}

impl TunnelZoneSync {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        control_plane: Arc<dyn ControlPlane>,
        tunnel_zone: impl Into<String>,
        encapsulation: Encapsulation,
    ) -> Self {
        Self {
            registry,
            control_plane,
            tunnel_zone: tunnel_zone.into(),
            encapsulation,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Handle for requesting a cooperative stop of the watch loop. The
    /// daemon itself never fires it; it exists for embedders and tests.
    pub fn stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// Run until the watch stream fails or a stop is requested. Any error
    /// before the watch loop starts is fatal to the run.
    pub async fn run(&self) -> Result<(), SyncError> {
        let zone =
            zone::ensure_tunnel_zone(&*self.control_plane, &self.tunnel_zone, self.encapsulation)
                .await?;

        let mut known: HashSet<String> = self
            .control_plane
            .list_hosts(&zone)
            .await?
            .into_iter()
            .map(|host| host.host_id)
            .collect();
        info!(
            zone = %zone.name,
            member_count = known.len(),
            "seeded known members from current tunnel zone membership"
        );

        let applier = MemberApplier::new(&*self.control_plane);
        let revision =
            catchup::catch_up(&*self.registry, &applier, &zone, &mut known).await?;
        watch::watch_registry(
            &*self.registry,
            &applier,
            &zone,
            revision,
            &mut known,
            &self.stop,
        )
        .await
    }
}
