//! Tunnel zone resolution.

use crate::controlplane::{ControlPlane, TunnelZone};
use crate::error::ControlPlaneError;
use crate::types::Encapsulation;
use tracing::{debug, error, info};

/// Ensure a tunnel zone with the given name exists and return a handle to it.
///
/// Existing zones are matched by exact name; the first listed match wins and
/// no duplicate is ever created. If the zone is absent it is created with
/// the given encapsulation. Creation failure is deliberately non-fatal: the
/// error is logged and the engine still attempts to fetch the zone it asked
/// for, in case the control plane created it anyway. Only a failed lookup
/// after that propagates.
pub async fn ensure_tunnel_zone(
    control_plane: &dyn ControlPlane,
    name: &str,
    encapsulation: Encapsulation,
) -> Result<TunnelZone, ControlPlaneError> {
    let zones = control_plane.list_tunnel_zones().await?;
    if let Some(zone) = zones.into_iter().find(|z| z.name == name) {
        debug!(zone = name, id = %zone.id, "tunnel zone already exists");
        return Ok(zone);
    }

    info!(zone = name, %encapsulation, "creating tunnel zone");
    match control_plane.create_tunnel_zone(name, encapsulation).await {
        Ok(zone) => Ok(zone),
        Err(e) => {
            error!(zone = name, error = %e, "failed to create tunnel zone");
            // Fail soft: the zone may exist on the control plane regardless
            // of the error. Look it up and fetch it before giving up.
            let fallback = control_plane
                .list_tunnel_zones()
                .await?
                .into_iter()
                .find(|z| z.name == name)
                .ok_or_else(|| {
                    ControlPlaneError::UnexpectedResponse(format!(
                        "tunnel zone {} not found after failed creation",
                        name
                    ))
                })?;
            control_plane.get_tunnel_zone(&fallback.id).await
        }
    }
}
