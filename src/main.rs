//! Packet Relay
//!
//! Accepts game clients, dials the configured upstream for each of them and
//! logs the traffic that flows through.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use packet_relay::{
    auth::{ConsoleAuthProvider, CredentialManager, CredentialStore},
    config::{CliOverrides, ConfigManager},
    observer::{LoggingObserver, NullObserver, PacketObserver},
    transport::{ForeignStatusProvider, TcpDialer, TcpPacketListener},
    ConnectionManager, ShutdownCoordinator,
};

/// CLI arguments for the relay
#[derive(Parser, Debug)]
#[command(name = "packet-relay")]
#[command(about = "Transparent relay that logs game traffic between a client and a server")]
#[command(version)]
#[command(long_about = "
Transparent relay that logs game traffic between a client and a server.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file, when it exists
3. Otherwise environment variables
4. Built-in defaults

Environment variables:
  RELAY_BIND_ADDR       - Listen address (e.g., 0.0.0.0:19132)
  RELAY_UPSTREAM_HOST   - Upstream server host
  RELAY_UPSTREAM_PORT   - Upstream server port
  RELAY_DIAL_TIMEOUT    - Upstream dial timeout (e.g., 10s)
  RELAY_TOKEN_FILE      - Credential cache file
  RELAY_LOG_LEVEL       - Log level (trace, debug, info, warn, error)

Type 'stop' and press enter to shut the relay down.
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "relay.toml", help = "Path to configuration file")]
    pub config: PathBuf,

    /// Upstream host (overrides config file)
    #[arg(long, help = "Host to connect to")]
    pub host: Option<String>,

    /// Upstream port (overrides config file)
    #[arg(short, long, help = "Port to connect to")]
    pub port: Option<u16>,

    /// Listen address (overrides config file)
    #[arg(short, long, help = "Listen address (e.g., 0.0.0.0:19132)")]
    pub bind: Option<String>,

    /// Credential cache file (overrides config file)
    #[arg(long, help = "Path to the cached token")]
    pub token_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Relay without logging packets
    #[arg(long, help = "Disable per-packet logging")]
    pub no_packet_log: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

impl CliArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            bind: self.bind.clone(),
            host: self.host.clone(),
            port: self.port,
            token_file: self.token_file.clone(),
            log_level: if self.verbose {
                Some("debug".to_string())
            } else {
                self.log_level.clone()
            },
            no_packet_log: self.no_packet_log,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Load configuration with priority: CLI args > config file or environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };
    config.merge_with_cli_args(&args.overrides());
    config
        .validate()
        .context("Final configuration validation failed")?;

    init_tracing(&config.logging.level)?;

    info!("Starting packet relay v{}", env!("CARGO_PKG_VERSION"));

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Bind address: {}", config.relay.bind_addr);
        info!("  Upstream: {}", config.relay.upstream_addr());
        info!("  Token file: {}", config.credentials.token_file.display());
        info!("  Packet logging: {}", config.logging.log_packets);
        return Ok(());
    }

    info!("Binding on {}", config.relay.bind_addr);
    info!("Connecting to {}", config.relay.upstream_addr());

    // Credentials are the only startup failure allowed to stop the process
    let provider = Arc::new(ConsoleAuthProvider::stdin(config.credentials.token_lifetime));
    let store = CredentialStore::new(&config.credentials.token_file);
    let credentials = Arc::new(
        CredentialManager::acquire(store, provider)
            .await
            .context("Failed to acquire credentials")?,
    );
    let _persist_guard = credentials.persist_guard();

    let observer: Arc<dyn PacketObserver> = if config.logging.log_packets {
        Arc::new(LoggingObserver::new())
    } else {
        Arc::new(NullObserver)
    };

    let options = config.relay.tcp_options();
    let status = Arc::new(ForeignStatusProvider::new(
        config.relay.upstream_addr(),
        &options,
        config.relay.status_ttl,
    ));
    let listener = TcpPacketListener::bind(config.relay.bind_addr, options.clone(), status)
        .await
        .with_context(|| format!("Failed to bind {}", config.relay.bind_addr))?;
    let manager = Arc::new(ConnectionManager::new(
        listener,
        TcpDialer::new(options),
        Arc::clone(&credentials),
        observer,
        config.relay.upstream_addr(),
    ));

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.spawn_signal_listener();
    shutdown
        .spawn_command_listener(BufReader::new(std::io::stdin()))
        .context("Failed to start console command listener")?;

    let accept_loop = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if let Err(e) = manager.run().await {
                error!("Relay error: {}", e);
            }
        })
    };

    info!("Relay started; press Ctrl+C or type 'stop' to shut down");

    let reason = shutdown.wait().await;
    info!("Shutting down: {}", reason);
    manager.initiate_shutdown();

    if let Err(e) = accept_loop.await {
        if !e.is_cancelled() {
            error!("Accept loop failed: {}", e);
        }
    }

    let stats = manager.stats();
    info!(
        "Relay stopped after serving {} sessions ({} still active)",
        stats.total_sessions_served, stats.active_sessions
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
