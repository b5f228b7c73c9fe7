//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::transport::{TcpOptions, DEFAULT_STATUS_TTL};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelayConfig,
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
}

/// Listener and upstream settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub upstream_host: String,
    pub upstream_port: u16,
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub login_timeout: Duration,
    pub max_frame_size: usize,
    pub chunk_radius: i32,
    /// How long an upstream status answer is reused; zero queries every time
    #[serde(with = "humantime_serde")]
    pub status_ttl: Duration,
}

/// Credential cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub token_file: PathBuf,
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_packets: bool,
}

impl RelayConfig {
    /// `host:port` of the upstream server
    pub fn upstream_addr(&self) -> String {
        format!("{}:{}", self.upstream_host, self.upstream_port)
    }

    /// Transport options derived from this section
    pub fn tcp_options(&self) -> TcpOptions {
        TcpOptions {
            max_frame_size: self.max_frame_size,
            login_timeout: self.login_timeout,
            dial_timeout: self.dial_timeout,
            chunk_radius: self.chunk_radius,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 19132)),
            upstream_host: "127.0.0.1".to_string(),
            upstream_port: 19134,
            dial_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            chunk_radius: 16,
            status_ttl: DEFAULT_STATUS_TTL,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("token.tok"),
            token_lifetime: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_packets: true,
        }
    }
}
