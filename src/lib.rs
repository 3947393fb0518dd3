//! Tzsync: Tunnel Zone Membership Synchronizer
//!
//! Keeps the membership of a control-plane tunnel zone synchronized with the
//! live agent registry held in an etcd store. Agents publish `uuid -> address`
//! entries under a fixed key prefix; tzsync performs a one-time snapshot
//! catch-up and then consumes the registry's change stream forever, adding
//! every registered agent to the configured tunnel zone.

pub mod config;
pub mod controlplane;
pub mod error;
pub mod logging;
pub mod registry;
pub mod sync;
pub mod types;

/// Registry key prefix under which agents publish `id -> address` entries.
pub const AGENTS_PREFIX: &str = "/midonet/agents/";
