//! Core types shared across the synchronization engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision: monotonically increasing store index identifying a point in the
/// registry's change history. Used to resume a watch without gaps.
pub type Revision = u64;

/// A live agent registration read from the registry: one `id -> address`
/// leaf entry under the agents prefix. Treated as read-only input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRecord {
    /// Opaque agent identifier (the final segment of the registry key).
    pub id: String,
    /// Tunnel endpoint address published by the agent.
    pub address: String,
}

impl AgentRecord {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// Tunneling technology used between member hosts of a tunnel zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encapsulation {
    Vxlan,
    Gre,
}

impl Default for Encapsulation {
    fn default() -> Self {
        Encapsulation::Vxlan
    }
}

impl Encapsulation {
    /// Wire name expected by the control-plane API's `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encapsulation::Vxlan => "vxlan",
            Encapsulation::Gre => "gre",
        }
    }
}

impl fmt::Display for Encapsulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
