//! supd - supplicant registry daemon
//!
//! Runs the proxy/callback registry on top of the in-memory supplicant
//! core, seeded with the interfaces and networks from the config file.
//! Every event the registry publishes is logged as JSON by a built-in
//! observer.
//!
//! # Usage
//!
//! ```bash
//! # Run in the foreground
//! supd run
//!
//! # Run with an explicit config file
//! supd run --config /etc/sup/supd.toml
//!
//! # Validate a config file and print what it declares
//! supd check-config --config /etc/sup/supd.toml
//!
//! # Enable debug logging
//! SUPD_LOG=supd=debug supd run
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: graceful shutdown (registry teardown)

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sup_core::memory::InMemorySupplicant;
use sup_core::{InterfaceCore, NetworkCore, Scope, SupplicantEvent};
use supd::config::DaemonConfig;
use supd::feed::{feed_channel, spawn_feed};
use supd::registry::{spawn_registry_with_buffer, RegistryHandle};
use supd::transport::{channel_observer, ChannelObserver, ObserverEndpoint};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter.
const LOG_ENV: &str = "SUPD_LOG";

/// supd - supplicant remote-object registry daemon
#[derive(Parser, Debug)]
#[command(name = "supd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon in the foreground
    Run {
        /// Config file (defaults to $SUPD_CONFIG, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'run' if no subcommand given
    let command = args.command.unwrap_or(Command::Run { config: None });

    match command {
        Command::Run { config } => {
            let (config, path) =
                DaemonConfig::resolve(config.as_deref()).context("Failed to load config")?;
            run_daemon(config, path)
        }
        Command::CheckConfig { config } => {
            let (config, path) =
                DaemonConfig::resolve(config.as_deref()).context("Failed to load config")?;
            match path {
                Some(path) => println!("Config: {}", path.display()),
                None => println!("Config: (defaults)"),
            }
            println!("Log filter: {}", config.log_filter);
            println!("Debug level: {:?}", config.debug_level);
            for iface in &config.interfaces {
                println!("Interface {} ({} networks)", iface.name, iface.networks.len());
            }
            Ok(())
        }
    }
}

fn init_logging(config: &DaemonConfig) -> Result<()> {
    let directives = env::var(LOG_ENV).unwrap_or_else(|_| config.log_filter.clone());

    let mut filter = EnvFilter::from_default_env();
    for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid log directive '{directive}'"))?,
        );
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: DaemonConfig, config_path: Option<PathBuf>) -> Result<()> {
    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        config = ?config_path,
        "supd starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry_with_buffer(config.command_buffer);

    let (notifier, feed_rx) = feed_channel();
    let supplicant = Arc::new(InMemorySupplicant::with_notifier(Arc::new(notifier)));

    // A second initialize is a startup bug; bail out rather than run half-wired.
    let root = registry
        .initialize(supplicant.clone())
        .await
        .context("Failed to initialize registry")?;
    root.set_debug_level(config.debug_level)
        .context("Failed to set debug level")?;
    info!(debug_level = ?config.debug_level, "Registry initialized");

    let feed_handle = spawn_feed(registry.clone(), feed_rx, cancel_token.clone());

    let (observer, endpoint) = channel_observer(config.observer_buffer, config.delivery_timeout());
    root.register_callback(observer.clone())
        .await
        .context("Failed to register event logger")?;
    let logger_handle = spawn_event_logger(registry.clone(), observer, endpoint);

    for iface_config in &config.interfaces {
        let iface = supplicant
            .add_interface(iface_config.name.clone())
            .with_context(|| format!("Failed to add interface {}", iface_config.name))?;

        for network_config in &iface_config.networks {
            let network_id = iface.add_network()?;
            if let Some(network) = iface.network(network_id) {
                network.set_ssid(network_config.ssid.as_bytes())?;
            }
        }
        info!(
            ifname = %iface_config.name,
            networks = iface_config.networks.len(),
            "Interface configured"
        );
    }

    cancel_token.cancelled().await;

    if let Err(e) = feed_handle.await {
        warn!(error = %e, "Event feed task failed");
    }

    match registry.snapshot().await {
        Ok(snapshot) => info!(
            entities = snapshot.entities.len(),
            callbacks = snapshot.total_callbacks(),
            "Registry state at shutdown"
        ),
        Err(e) => warn!(error = %e, "Failed to snapshot registry"),
    }

    registry
        .teardown()
        .await
        .context("Failed to tear down registry")?;
    logger_handle.abort();

    info!("supd stopped");
    Ok(())
}

/// Logs every event the built-in observer receives.
///
/// The observer starts on the global scope and follows each interface and
/// network as it appears.
fn spawn_event_logger(
    registry: RegistryHandle,
    observer: Arc<ChannelObserver>,
    mut endpoint: ObserverEndpoint,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = endpoint.recv().await {
            match serde_json::to_string(&envelope) {
                Ok(json) => info!(scope = %envelope.scope, event = %json, "Event"),
                Err(e) => warn!(error = %e, "Failed to encode event"),
            }

            let follow = match &envelope.event {
                SupplicantEvent::InterfaceCreated { ifname } => {
                    Some(Scope::interface(ifname.clone()))
                }
                SupplicantEvent::NetworkAdded { ifname, network_id } => {
                    Some(Scope::network(ifname.clone(), *network_id))
                }
                _ => None,
            };

            if let Some(scope) = follow {
                match registry.add_callback(scope.clone(), observer.clone()).await {
                    Ok(()) => debug!(scope = %scope, "Event logger following scope"),
                    Err(e) => {
                        debug!(scope = %scope, error = %e, "Event logger not following scope")
                    }
                }
            }
        }
    })
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
