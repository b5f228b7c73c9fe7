//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Smallest accepted frame size limit
const MIN_FRAME_SIZE: usize = 1024;
/// Largest accepted frame size limit
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Manages configuration loading and validation
pub struct ConfigManager;

/// Values given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub no_packet_log: bool,
}

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables on top of defaults
    pub fn load_from_env() -> Result<Config> {
        Self::load_from_vars(|name| std::env::var(name).ok())
    }

    /// Same as `load_from_env`, reading variables through `lookup`
    pub fn load_from_vars<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(bind_addr) = lookup("RELAY_BIND_ADDR") {
            config.relay.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid RELAY_BIND_ADDR: {}", bind_addr))?;
        }

        if let Some(host) = lookup("RELAY_UPSTREAM_HOST") {
            config.relay.upstream_host = host;
        }

        if let Some(port) = lookup("RELAY_UPSTREAM_PORT") {
            config.relay.upstream_port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid RELAY_UPSTREAM_PORT: {}", port))?;
        }

        if let Some(timeout) = lookup("RELAY_DIAL_TIMEOUT") {
            config.relay.dial_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid RELAY_DIAL_TIMEOUT: {}", timeout))?;
        }

        if let Some(token_file) = lookup("RELAY_TOKEN_FILE") {
            config.credentials.token_file = PathBuf::from(token_file);
        }

        if let Some(log_level) = lookup("RELAY_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_relay_config()
            .with_context(|| "Relay configuration validation failed")?;

        self.validate_credentials_config()
            .with_context(|| "Credentials configuration validation failed")?;

        self.validate_logging_config()
            .with_context(|| "Logging configuration validation failed")?;

        Ok(())
    }

    fn validate_relay_config(&self) -> Result<()> {
        if self.relay.upstream_host.trim().is_empty() {
            bail!("upstream_host must not be empty");
        }

        if self.relay.upstream_port == 0 {
            bail!("upstream_port must be greater than 0");
        }

        if self.relay.dial_timeout.is_zero() {
            bail!("dial_timeout must be greater than 0");
        }

        if self.relay.login_timeout.is_zero() {
            bail!("login_timeout must be greater than 0");
        }

        if self.relay.max_frame_size < MIN_FRAME_SIZE {
            bail!("max_frame_size must be at least {} bytes", MIN_FRAME_SIZE);
        }

        if self.relay.max_frame_size > MAX_FRAME_SIZE {
            bail!("max_frame_size cannot exceed {} bytes", MAX_FRAME_SIZE);
        }

        if self.relay.chunk_radius <= 0 {
            bail!("chunk_radius must be greater than 0");
        }

        Ok(())
    }

    fn validate_credentials_config(&self) -> Result<()> {
        if self.credentials.token_file.as_os_str().is_empty() {
            bail!("token_file must not be empty");
        }

        if self.credentials.token_lifetime.is_zero() {
            bail!("token_lifetime must be greater than 0");
        }

        Ok(())
    }

    fn validate_logging_config(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "logging.level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(&mut self, overrides: &CliOverrides) {
        if let Some(bind_str) = overrides.bind.as_deref() {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.relay.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        if let Some(host) = &overrides.host {
            self.relay.upstream_host = host.clone();
            tracing::info!("CLI override: upstream host set to {}", host);
        }

        if let Some(port) = overrides.port {
            self.relay.upstream_port = port;
            tracing::info!("CLI override: upstream port set to {}", port);
        }

        if let Some(token_file) = &overrides.token_file {
            self.credentials.token_file = token_file.clone();
            tracing::info!("CLI override: token file set to {}", token_file.display());
        }

        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }

        if overrides.no_packet_log {
            self.logging.log_packets = false;
            tracing::info!("CLI override: packet logging disabled");
        }
    }
}
