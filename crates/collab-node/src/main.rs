//! LAN-Collab node entry point.
//!
//! Wires the coordinator to its sockets and the console, then runs until the
//! user quits or presses Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! collab-node [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: platform config dir]
//!   --subnet <CIDR>          Subnet to announce on, e.g. 192.168.1.0/24
//!   --broadcast-port <PORT>  UDP announce port
//!   --unicast-port <PORT>    TCP call port
//!   --name <NAME>            Display name sent to peers
//! ```
//!
//! Each option can also be set with an environment variable
//! (`LANCOLLAB_CONFIG`, `LANCOLLAB_SUBNET`, ...).  Options given on the command
//! line or in the environment win over the config file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config, resolve local address inside the subnet
//!  └─ CollaborationCoordinator::new(SocketTransport)
//!  └─ start services
//!       ├─ announce listener  (UDP, broadcast port)
//!       ├─ call listener      (TCP, unicast port)
//!       ├─ event pump         (drives the work loop)
//!       └─ console            (stdin commands)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use collab_node::application::coordinate_collaboration::{CollaborationCoordinator, NodeIdentity};
use collab_node::infrastructure::console::{
    run_event_pump, spawn_stdin_reader, Console, WorkLoop, WORK_PERIOD,
};
use collab_node::infrastructure::network::{
    broadcast::start_announce_listener,
    interfaces::SystemInterfaces,
    transport::{wildcard_endpoint, SocketTransport},
    unicast::start_call_listener,
};
use collab_node::infrastructure::storage::config::{load_config, NodeConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LAN-Collab node.
#[derive(Debug, Parser)]
#[command(
    name = "collab-node",
    about = "Announce and coordinate single-owner collaboration sessions on a LAN",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "LANCOLLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Subnet in CIDR notation; announcements go to its broadcast address.
    #[arg(long, env = "LANCOLLAB_SUBNET")]
    subnet: Option<String>,

    /// UDP port for announcements.
    #[arg(long, env = "LANCOLLAB_BROADCAST_PORT")]
    broadcast_port: Option<u16>,

    /// TCP port for subscribe and stop calls.
    #[arg(long, env = "LANCOLLAB_UNICAST_PORT")]
    unicast_port: Option<u16>,

    /// Display name sent to peers.
    #[arg(long, env = "LANCOLLAB_NAME")]
    name: Option<String>,
}

impl Cli {
    /// Overlays every option that was given onto `config`.
    fn apply_to(&self, config: &mut NodeConfig) {
        if let Some(subnet) = &self.subnet {
            config.network.subnet = subnet.clone();
        }
        if let Some(port) = self.broadcast_port {
            config.network.broadcast_port = port;
        }
        if let Some(port) = self.unicast_port {
            config.network.unicast_port = port;
        }
        if let Some(name) = &self.name {
            config.node.name = name.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut config);

    // Structured logging.  `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.node.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("LAN-Collab node {} starting", config.node.name);

    // ── Addressing ────────────────────────────────────────────────────────────
    let network = config.network_address().context("invalid configuration")?;
    let local_address = network
        .resolve_local_address(&SystemInterfaces)
        .with_context(|| format!("cannot join {network}"))?;
    info!("local address {local_address} in {network}");

    // ── Coordinator ───────────────────────────────────────────────────────────
    let transport = SocketTransport::bind(&network, config.call_timeout())
        .await
        .context("failed to open broadcast socket")?;
    let identity = NodeIdentity {
        name: config.node.name.clone(),
        local_address,
        network,
        broadcast_port: config.network.broadcast_port,
        unicast_port: config.network.unicast_port,
    };
    let (coordinator, events) = CollaborationCoordinator::new(identity, Arc::new(transport));
    let coordinator = Arc::new(coordinator);

    // ── Listeners ─────────────────────────────────────────────────────────────
    let announce_listener = start_announce_listener(
        wildcard_endpoint(&network, config.network.broadcast_port),
        Arc::clone(&coordinator),
    )
    .await
    .context("failed to start announce listener")?;
    let call_listener = start_call_listener(
        wildcard_endpoint(&network, config.network.unicast_port),
        Arc::clone(&coordinator),
        config.call_timeout(),
    )
    .await
    .context("failed to start call listener")?;

    // ── Event pump and console ────────────────────────────────────────────────
    let work = Arc::new(WorkLoop::new(WORK_PERIOD));
    let pump = tokio::spawn(run_event_pump(events, Arc::clone(&work)));
    let console = Console::new(Arc::clone(&coordinator), Arc::clone(&work));
    let lines = spawn_stdin_reader().context("failed to read stdin")?;
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = console.run(lines, &mut stdout) => {
            if let Err(e) = result {
                warn!("console stopped: {e}");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("failed to listen for Ctrl-C: {e}");
            }
            info!("shutdown signal received");
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    work.cancel();
    let outcome = coordinator.stop().await;
    info!("final session state: {outcome:?}");
    announce_listener.shutdown().await;
    call_listener.shutdown().await;
    pump.abort();

    info!("LAN-Collab node stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
