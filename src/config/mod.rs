//! Configuration for the synchronizer.
//!
//! Defaults suit a local development setup (everything on localhost, admin
//! credentials). Precedence, lowest to highest: built-in defaults, the
//! global config file, an explicitly named config file, `TZSYNC__`-prefixed
//! environment variables. CLI flags are applied on top by the binary.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::types::Encapsulation;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Control-plane API endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidonetConfig {
    #[serde(default = "default_midonet_url")]
    pub url: String,
    #[serde(default = "default_admin")]
    pub username: String,
    #[serde(default = "default_admin")]
    pub password: String,
    #[serde(default = "default_admin")]
    pub project: String,
}

impl Default for MidonetConfig {
    fn default() -> Self {
        Self {
            url: default_midonet_url(),
            username: default_admin(),
            password: default_admin(),
            project: default_admin(),
        }
    }
}

/// Registry (etcd) endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtcdConfig {
    #[serde(default = "default_etcd_host")]
    pub host: String,
    #[serde(default = "default_etcd_port")]
    pub port: u16,
}

impl EtcdConfig {
    /// Base URL of the store's HTTP API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            host: default_etcd_host(),
            port: default_etcd_port(),
        }
    }
}

/// Top-level synchronizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Name of the tunnel zone to add agents to.
    #[serde(default = "default_tunnel_zone")]
    pub tunnel_zone: String,

    /// Encapsulation used if the tunnel zone has to be created.
    #[serde(default)]
    pub encapsulation: Encapsulation,

    #[serde(default)]
    pub midonet: MidonetConfig,

    #[serde(default)]
    pub etcd: EtcdConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tunnel_zone: default_tunnel_zone(),
            encapsulation: Encapsulation::default(),
            midonet: MidonetConfig::default(),
            etcd: EtcdConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_tunnel_zone() -> String {
    "default".to_string()
}

fn default_midonet_url() -> String {
    "http://localhost:8181/midonet-api/".to_string()
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_etcd_host() -> String {
    "localhost".to_string()
}

fn default_etcd_port() -> u16 {
    4001
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from standard sources and the environment.
    pub fn load(explicit_file: Option<&Path>) -> Result<SyncConfig, ConfigError> {
        let mut builder = Self::builder();
        if let Some(global) = Self::global_config_path() {
            builder = builder.add_source(File::from(global).required(false));
        }
        if let Some(path) = explicit_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("TZSYNC")
                .separator("__")
                .try_parsing(true),
        );
        let config = builder.build().map_err(ConfigError::Load)?;
        config.try_deserialize().map_err(ConfigError::Load)
    }

    fn builder() -> ConfigBuilder<DefaultState> {
        Config::builder()
    }

    /// Global config file path (~/.config/tzsync/config.toml).
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "tzsync", "tzsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
