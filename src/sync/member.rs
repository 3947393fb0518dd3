//! Per-record application of agent registrations to a tunnel zone.

use crate::controlplane::{ControlPlane, TunnelZone};
use crate::error::ControlPlaneError;
use crate::types::AgentRecord;
use std::collections::HashSet;
use tracing::{error, info};

/// Result of one application attempt. Failures carry their reason but never
/// abort the caller's loop; one bad record must not stop the rest.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The control plane accepted the membership record.
    Added,
    /// The control plane rejected it or was unreachable.
    Failed(ControlPlaneError),
}

impl ApplyOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, ApplyOutcome::Added)
    }
}

/// Applies one `(id, address)` registration to a tunnel zone.
///
/// Performs no existence check of its own; deduplication is the caller's
/// responsibility via the known-members set. Calling it again for a host
/// that is already a true member may succeed or fail depending on the
/// control plane, and either outcome is acceptable.
pub struct MemberApplier<'a> {
    control_plane: &'a dyn ControlPlane,
}

impl<'a> MemberApplier<'a> {
    pub fn new(control_plane: &'a dyn ControlPlane) -> Self {
        Self { control_plane }
    }

    pub async fn apply(&self, zone: &TunnelZone, id: &str, address: &str) -> ApplyOutcome {
        match self.control_plane.add_host(zone, id, address).await {
            Ok(()) => {
                info!(
                    host = id,
                    address,
                    zone = %zone.name,
                    "host added to tunnel zone"
                );
                ApplyOutcome::Added
            }
            Err(e) => {
                error!(
                    host = id,
                    address,
                    zone = %zone.name,
                    error = %e,
                    "failed to add host to tunnel zone"
                );
                ApplyOutcome::Failed(e)
            }
        }
    }

    /// Apply every record not already known, growing `known` with each
    /// success. Already-known records are skipped; failed records are left
    /// out of `known` and processing continues with the next one.
    pub async fn apply_missing(
        &self,
        zone: &TunnelZone,
        records: &[AgentRecord],
        known: &mut HashSet<String>,
    ) {
        for record in records {
            if known.contains(&record.id) {
                info!(
                    host = %record.id,
                    zone = %zone.name,
                    "host already in tunnel zone"
                );
                continue;
            }
            if self.apply(zone, &record.id, &record.address).await.is_added() {
                known.insert(record.id.clone());
            }
        }
    }
}
