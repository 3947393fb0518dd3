//! Steady-state watch loop over the registry's change stream.

use super::member::MemberApplier;
use crate::controlplane::TunnelZone;
use crate::error::{RegistryError, SyncError};
use crate::registry::AgentRegistry;
use crate::types::Revision;
use futures::StreamExt;
use std::collections::HashSet;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Consume registry mutations forever, applying each one to the tunnel zone.
///
/// The subscription starts at exactly `from` (the snapshot revision), so a
/// mutation committed at snapshot time may be delivered again; the known
/// set absorbs the duplicate. Each event is fully processed, including any
/// control-plane calls, before the next one is pulled. Per-record failures
/// never end the loop; only a broken stream does, and that error
/// propagates. `stop` is a cooperative stop signal: once notified, the loop
/// returns `Ok` without consuming further events.
pub async fn watch_registry(
    registry: &dyn AgentRegistry,
    applier: &MemberApplier<'_>,
    zone: &TunnelZone,
    from: Revision,
    known: &mut HashSet<String>,
    stop: &Notify,
) -> Result<(), SyncError> {
    let mut events = registry.watch(from);
    info!(from, zone = %zone.name, "watching registry for agent registrations");

    loop {
        tokio::select! {
            _ = stop.notified() => {
                info!(zone = %zone.name, "stop requested, leaving watch loop");
                return Ok(());
            }
            event = events.next() => match event {
                Some(Ok(event)) => {
                    debug!(
                        revision = event.revision,
                        record_count = event.records.len(),
                        "registry change delivered"
                    );
                    applier.apply_missing(zone, &event.records, known).await;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(RegistryError::WatchFailed(
                        "watch stream ended unexpectedly".to_string(),
                    )
                    .into())
                }
            },
        }
    }
}
