//! Session Statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::observer::Direction;

/// Live packet counters for one session
#[derive(Debug)]
pub struct SessionStats {
    started: Instant,
    packets_from_client: AtomicU64,
    packets_from_server: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            packets_from_client: AtomicU64::new(0),
            packets_from_server: AtomicU64::new(0),
        }
    }

    /// Count one packet forwarded in the given direction
    pub fn record(&self, direction: Direction) {
        match direction {
            Direction::Client => self.packets_from_client.fetch_add(1, Ordering::Relaxed),
            Direction::Server => self.packets_from_server.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn packets_from_client(&self) -> u64 {
        self.packets_from_client.load(Ordering::Relaxed)
    }

    pub fn packets_from_server(&self) -> u64 {
        self.packets_from_server.load(Ordering::Relaxed)
    }

    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report for a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub client: String,
    pub upstream: String,
    pub duration_ms: u64,
    pub packets_from_client: u64,
    pub packets_from_server: u64,
    pub close_reason: Option<String>,
}

impl SessionSummary {
    pub fn log(&self) {
        info!(
            session_id = %self.session_id,
            client = %self.client,
            upstream = %self.upstream,
            duration_ms = self.duration_ms,
            packets_from_client = self.packets_from_client,
            packets_from_server = self.packets_from_server,
            close_reason = self.close_reason.as_deref().unwrap_or("-"),
            "Relay session completed"
        );
    }
}
