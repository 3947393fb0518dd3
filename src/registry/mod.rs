//! Agent registry boundary.
//!
//! The registry is a distributed KV store in which agents publish
//! `id -> address` entries under a fixed prefix. This module defines the
//! read interface the reconciliation engine depends on; `etcd` provides the
//! production adapter. Storage, replication, and watch-delivery guarantees
//! belong to the store itself and are assumed here.

pub mod etcd;

use crate::error::RegistryError;
use crate::types::{AgentRecord, Revision};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Point-in-time view of the registry subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Leaf records only; intermediate directory nodes are already skipped.
    pub records: Vec<AgentRecord>,
    /// Store revision at which the read was taken. The watch must resume at
    /// exactly this revision.
    pub revision: Revision,
}

/// One delivered registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEvent {
    /// Leaf records the mutation touched. Empty for mutations that carry no
    /// usable `id -> address` pair (deletions, directory-only changes).
    pub records: Vec<AgentRecord>,
    /// Revision at which the mutation was committed.
    pub revision: Revision,
}

/// Infinite sequence of registry mutations. An `Err` item is fatal: the
/// stream must not be polled again after yielding one.
pub type EventStream<'a> = BoxStream<'a, Result<RegistryEvent, RegistryError>>;

/// Read interface onto the agent registry.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Recursive read of the full subtree under the agents prefix, returning
    /// the leaf records and the revision the read was taken at.
    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError>;

    /// Subscribe to mutations under the agents prefix, recursive, starting
    /// at exactly `from` (inclusive). A mutation committed at `from` may be
    /// delivered again; callers are expected to deduplicate.
    fn watch(&self, from: Revision) -> EventStream<'_>;
}
