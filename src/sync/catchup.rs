//! One-time snapshot reconciliation performed before the watch loop.

use super::member::MemberApplier;
use crate::controlplane::TunnelZone;
use crate::error::SyncError;
use crate::registry::AgentRegistry;
use crate::types::Revision;
use std::collections::HashSet;
use tracing::info;

/// Bring the tunnel zone up to date with the registry's current contents.
///
/// Reads one recursive snapshot of the agents subtree, applies every record
/// whose id is not already known, and returns the revision the snapshot was
/// taken at. The watch loop resumes at exactly that revision, so nothing
/// committed during or after the read can be missed. An empty subtree
/// leaves `known` untouched and still returns the current revision.
pub async fn catch_up(
    registry: &dyn AgentRegistry,
    applier: &MemberApplier<'_>,
    zone: &TunnelZone,
    known: &mut HashSet<String>,
) -> Result<Revision, SyncError> {
    let snapshot = registry.snapshot().await?;
    info!(
        revision = snapshot.revision,
        record_count = snapshot.records.len(),
        zone = %zone.name,
        "catching up tunnel zone with registry snapshot"
    );
    applier.apply_missing(zone, &snapshot.records, known).await;
    Ok(snapshot.revision)
}
