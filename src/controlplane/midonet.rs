//! MidoNet REST adapter for the control plane.
//!
//! Plain JSON over the cluster API: tunnel zones live at
//! `{base}/tunnel_zones`, members at `{base}/tunnel_zones/{id}/hosts`.
//! Every request carries HTTP basic auth and an `X-Auth-Project` header;
//! token lifecycle management stays inside the cluster API.

use super::{ControlPlane, TunnelZone, TunnelZoneHost};
use crate::error::ControlPlaneError;
use crate::types::Encapsulation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const PROJECT_HEADER: &str = "X-Auth-Project";

/// Credentials for the cluster API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub project: String,
}

/// Control-plane adapter over a MidoNet cluster endpoint.
pub struct MidonetClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl MidonetClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.post(self.url(path)))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(PROJECT_HEADER, &self.credentials.project)
    }
}

fn check(
    operation: &'static str,
    response: &reqwest::Response,
) -> Result<(), ControlPlaneError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ControlPlaneError::Rejected { operation, status })
    }
}

/// Extract a server-assigned resource id from a `Location` header.
fn id_from_location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
        .map(str::to_string)
}

#[async_trait]
impl ControlPlane for MidonetClient {
    async fn list_tunnel_zones(&self) -> Result<Vec<TunnelZone>, ControlPlaneError> {
        let response = self.get("tunnel_zones").send().await?;
        check("list tunnel zones", &response)?;
        let zones: Vec<TunnelZoneDto> = response.json().await.map_err(|e| {
            ControlPlaneError::UnexpectedResponse(format!("undecodable tunnel zone list: {}", e))
        })?;
        Ok(zones.into_iter().map(TunnelZoneDto::into_zone).collect())
    }

    async fn create_tunnel_zone(
        &self,
        name: &str,
        encapsulation: Encapsulation,
    ) -> Result<TunnelZone, ControlPlaneError> {
        let response = self
            .post("tunnel_zones")
            .json(&json!({ "name": name, "type": encapsulation.as_str() }))
            .send()
            .await?;
        check("create tunnel zone", &response)?;

        if let Some(id) = id_from_location(&response) {
            debug!(zone = name, id = %id, "tunnel zone created");
            return Ok(TunnelZone {
                id,
                name: name.to_string(),
            });
        }
        // Some deployments return the resource body instead of a Location.
        let dto: TunnelZoneDto = response.json().await.map_err(|e| {
            ControlPlaneError::UnexpectedResponse(format!(
                "created tunnel zone but could not identify it: {}",
                e
            ))
        })?;
        Ok(dto.into_zone())
    }

    async fn get_tunnel_zone(&self, id: &str) -> Result<TunnelZone, ControlPlaneError> {
        let response = self.get(&format!("tunnel_zones/{}", id)).send().await?;
        check("get tunnel zone", &response)?;
        let dto: TunnelZoneDto = response.json().await.map_err(|e| {
            ControlPlaneError::UnexpectedResponse(format!("undecodable tunnel zone: {}", e))
        })?;
        Ok(dto.into_zone())
    }

    async fn list_hosts(
        &self,
        zone: &TunnelZone,
    ) -> Result<Vec<TunnelZoneHost>, ControlPlaneError> {
        let response = self
            .get(&format!("tunnel_zones/{}/hosts", zone.id))
            .send()
            .await?;
        check("list tunnel zone hosts", &response)?;
        let hosts: Vec<TunnelZoneHostDto> = response.json().await.map_err(|e| {
            ControlPlaneError::UnexpectedResponse(format!("undecodable host list: {}", e))
        })?;
        Ok(hosts.into_iter().map(TunnelZoneHostDto::into_host).collect())
    }

    async fn add_host(
        &self,
        zone: &TunnelZone,
        host_id: &str,
        ip_address: &str,
    ) -> Result<(), ControlPlaneError> {
        let response = self
            .post(&format!("tunnel_zones/{}/hosts", zone.id))
            .json(&json!({ "hostId": host_id, "ipAddress": ip_address }))
            .send()
            .await?;
        check("add tunnel zone host", &response)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TunnelZoneDto {
    id: String,
    name: String,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: Option<String>,
}

impl TunnelZoneDto {
    fn into_zone(self) -> TunnelZone {
        TunnelZone {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TunnelZoneHostDto {
    #[serde(rename = "hostId")]
    host_id: String,
    #[serde(rename = "ipAddress")]
    ip_address: String,
}

impl TunnelZoneHostDto {
    fn into_host(self) -> TunnelZoneHost {
        TunnelZoneHost {
            host_id: self.host_id,
            ip_address: self.ip_address,
        }
    }
}
