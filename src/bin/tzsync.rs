//! tzsync daemon entry point.
//!
//! Watches the agent registry in etcd and registers every published agent
//! as a member of the configured tunnel zone. Runs until the watch stream
//! fails or the process is terminated.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tzsync::config::{ConfigLoader, SyncConfig};
use tzsync::controlplane::midonet::{Credentials, MidonetClient};
use tzsync::logging;
use tzsync::registry::etcd::EtcdRegistry;
use tzsync::sync::TunnelZoneSync;
use tzsync::types::Encapsulation;
use tzsync::AGENTS_PREFIX;

/// Watches the agent registry and registers hosts into the tunnel zone.
#[derive(Parser)]
#[command(name = "tzsync")]
#[command(about = "Keeps a tunnel zone's membership synchronized with the agent registry in etcd")]
struct Cli {
    /// Name of the tunnel zone to add the hosts to (default: "default")
    #[arg(long)]
    tunnel_zone: Option<String>,

    /// Encapsulation technology to use if the tunnel zone does not exist yet
    #[arg(long, value_enum)]
    encapsulation: Option<Encapsulation>,

    /// Endpoint of the control-plane cluster API
    #[arg(long)]
    midonet_url: Option<String>,

    /// Admin username for the cluster API
    #[arg(long)]
    username: Option<String>,

    /// Admin password for the cluster API
    #[arg(long)]
    password: Option<String>,

    /// Admin project name for the cluster API
    #[arg(long)]
    project: Option<String>,

    /// Address of the etcd server
    #[arg(long)]
    etcd_host: Option<String>,

    /// Port of the etcd server
    #[arg(long)]
    etcd_port: Option<u16>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// CLI flags override everything loaded from files and environment.
    fn apply_to(&self, config: &mut SyncConfig) {
        if let Some(v) = &self.tunnel_zone {
            config.tunnel_zone = v.clone();
        }
        if let Some(v) = self.encapsulation {
            config.encapsulation = v;
        }
        if let Some(v) = &self.midonet_url {
            config.midonet.url = v.clone();
        }
        if let Some(v) = &self.username {
            config.midonet.username = v.clone();
        }
        if let Some(v) = &self.password {
            config.midonet.password = v.clone();
        }
        if let Some(v) = &self.project {
            config.midonet.project = v.clone();
        }
        if let Some(v) = &self.etcd_host {
            config.etcd.host = v.clone();
        }
        if let Some(v) = self.etcd_port {
            config.etcd.port = v;
        }
        if let Some(v) = &self.log_level {
            config.logging.level = v.clone();
        }
        if let Some(v) = &self.log_format {
            config.logging.format = v.clone();
        }
        if let Some(v) = &self.log_output {
            config.logging.output = v.clone();
        }
        if let Some(v) = &self.log_file {
            config.logging.file = Some(v.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut config);

    logging::init_logging(&config.logging).context("failed to initialize logging")?;

    let registry = Arc::new(EtcdRegistry::new(config.etcd.base_url(), AGENTS_PREFIX));
    let control_plane = Arc::new(MidonetClient::new(
        config.midonet.url.clone(),
        Credentials {
            username: config.midonet.username.clone(),
            password: config.midonet.password.clone(),
            project: config.midonet.project.clone(),
        },
    ));

    let sync = TunnelZoneSync::new(
        registry,
        control_plane,
        config.tunnel_zone.clone(),
        config.encapsulation,
    );
    sync.run().await.context("synchronization failed")?;
    Ok(())
}
