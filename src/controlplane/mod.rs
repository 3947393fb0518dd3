//! Control-plane boundary.
//!
//! The control plane owns the tunnel-zone and membership resources the
//! engine writes to. This module defines the operations the engine invokes;
//! `midonet` provides the production REST adapter. CRUD correctness of the
//! API itself is assumed.

pub mod midonet;

use crate::error::ControlPlaneError;
use crate::types::Encapsulation;
use async_trait::async_trait;

/// Handle to a tunnel zone in the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelZone {
    pub id: String,
    pub name: String,
}

/// A host that is a member of a tunnel zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelZoneHost {
    pub host_id: String,
    pub ip_address: String,
}

/// Operations the engine performs against the control plane.
///
/// `add_host` performs no existence check; calling it for a host that is
/// already a member may succeed or fail depending on the API's own
/// semantics, and either outcome is acceptable to the engine (idempotence
/// is the caller's responsibility).
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_tunnel_zones(&self) -> Result<Vec<TunnelZone>, ControlPlaneError>;

    async fn create_tunnel_zone(
        &self,
        name: &str,
        encapsulation: Encapsulation,
    ) -> Result<TunnelZone, ControlPlaneError>;

    async fn get_tunnel_zone(&self, id: &str) -> Result<TunnelZone, ControlPlaneError>;

    async fn list_hosts(&self, zone: &TunnelZone)
        -> Result<Vec<TunnelZoneHost>, ControlPlaneError>;

    async fn add_host(
        &self,
        zone: &TunnelZone,
        host_id: &str,
        ip_address: &str,
    ) -> Result<(), ControlPlaneError>;
}
