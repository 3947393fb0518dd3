//! etcd v2 HTTP adapter for the agent registry.
//!
//! Speaks the plain keys API: a recursive `GET /v2/keys{prefix}` for the
//! snapshot (the revision is the `X-Etcd-Index` response header) and
//! long-poll `?wait=true&waitIndex=N` requests for the watch stream, one
//! mutation per response. The stream never reconnects on its own; a broken
//! subscription is fatal to the caller.

use super::{AgentRegistry, EventStream, RegistryEvent, RegistrySnapshot};
use crate::error::RegistryError;
use crate::types::{AgentRecord, Revision};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

const ETCD_INDEX_HEADER: &str = "X-Etcd-Index";

/// Registry adapter over an etcd v2 HTTP endpoint.
pub struct EtcdRegistry {
    client: reqwest::Client,
    base_url: String,
    prefix: String,
}

impl EtcdRegistry {
    /// `base_url` is the store's HTTP endpoint (e.g. `http://localhost:4001`),
    /// `prefix` the registry key prefix the agents publish under.
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix: prefix.into(),
        }
    }

    fn keys_url(&self) -> String {
        format!(
            "{}/v2/keys{}",
            self.base_url,
            self.prefix.trim_end_matches('/')
        )
    }

    async fn wait_for_event(&self, index: Revision) -> Result<RegistryEvent, RegistryError> {
        let response = self
            .client
            .get(self.keys_url())
            .query(&[("wait", "true"), ("recursive", "true")])
            .query(&[("waitIndex", index)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::WatchFailed(format!(
                "watch request returned {}: {}",
                status, body
            )));
        }

        let envelope: EtcdResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::WatchFailed(format!("undecodable watch event: {}", e)))?;
        event_from_response(envelope)
    }
}

#[async_trait]
impl AgentRegistry for EtcdRegistry {
    async fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        let response = self
            .client
            .get(self.keys_url())
            .query(&[("recursive", "true")])
            .send()
            .await?;

        let status = response.status();
        // A missing prefix directory is an empty registry, not a failure.
        if status == reqwest::StatusCode::NOT_FOUND {
            let revision = etcd_index(response.headers())?;
            return Ok(RegistrySnapshot {
                records: Vec::new(),
                revision,
            });
        }
        if !status.is_success() {
            return Err(RegistryError::UnexpectedResponse(format!(
                "snapshot read returned {}",
                status
            )));
        }

        let revision = etcd_index(response.headers())?;
        let envelope: EtcdResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::UnexpectedResponse(format!("undecodable snapshot: {}", e)))?;

        let mut records = Vec::new();
        if let Some(node) = envelope.node {
            collect_leaves(&node, &mut records);
        }
        debug!(
            revision,
            record_count = records.len(),
            "registry snapshot read"
        );
        Ok(RegistrySnapshot { records, revision })
    }

    fn watch(&self, from: Revision) -> EventStream<'_> {
        futures::stream::try_unfold(from, move |index| async move {
            let event = self.wait_for_event(index).await?;
            let next = event.revision + 1;
            Ok(Some((event, next)))
        })
        .boxed()
    }
}

fn etcd_index(headers: &reqwest::header::HeaderMap) -> Result<Revision, RegistryError> {
    headers
        .get(ETCD_INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Revision>().ok())
        .ok_or_else(|| {
            RegistryError::UnexpectedResponse(format!(
                "missing or invalid {} header",
                ETCD_INDEX_HEADER
            ))
        })
}

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    #[allow(dead_code)]
    action: Option<String>,
    node: Option<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    nodes: Option<Vec<EtcdNode>>,
    #[serde(rename = "modifiedIndex")]
    modified_index: Option<u64>,
}

/// Flatten a node tree into leaf records, skipping directory nodes. The id
/// is the final segment of the node key; the value passes through verbatim.
fn collect_leaves(node: &EtcdNode, out: &mut Vec<AgentRecord>) {
    if node.dir {
        if let Some(children) = &node.nodes {
            for child in children {
                collect_leaves(child, out);
            }
        }
        return;
    }
    if let (Some(key), Some(value)) = (&node.key, &node.value) {
        let id = key.rsplit('/').next().unwrap_or(key).to_string();
        out.push(AgentRecord::new(id, value.clone()));
    }
}

fn event_from_response(envelope: EtcdResponse) -> Result<RegistryEvent, RegistryError> {
    let node = envelope.node.ok_or_else(|| {
        RegistryError::WatchFailed("watch event without a node".to_string())
    })?;
    let revision = node.modified_index.ok_or_else(|| {
        RegistryError::WatchFailed("watch event without a modifiedIndex".to_string())
    })?;
    // Deletions and expirations carry no value; they surface as an event
    // with no records. The engine never removes members.
    let mut records = Vec::new();
    collect_leaves(&node, &mut records);
    Ok(RegistryEvent { records, revision })
}
