//! Server Status
//!
//! Clients may ping a server for its list entry before logging in. The TCP
//! listener answers those pings from a `StatusProvider`; the relay uses
//! `ForeignStatusProvider` so it advertises whatever its upstream reports.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{codec, ConnError, TcpOptions};
use crate::protocol::{Packet, ServerStatus};

/// How long a fetched upstream status is reused by default
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(5);

/// Source of the server list entry shown to pinging clients
#[async_trait]
pub trait StatusProvider: Send + Sync + 'static {
    async fn server_status(&self) -> ServerStatus;
}

/// Always reports the same entry
#[derive(Debug, Clone, Default)]
pub struct StaticStatusProvider {
    status: ServerStatus,
}

impl StaticStatusProvider {
    pub fn new(status: ServerStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl StatusProvider for StaticStatusProvider {
    async fn server_status(&self) -> ServerStatus {
        self.status.clone()
    }
}

/// Reports the upstream's own status.
///
/// The upstream is queried on demand and the answer is reused for `ttl`.
/// Concurrent pings share one query. When the upstream cannot be reached the
/// last known status is served, or a placeholder if there is none.
pub struct ForeignStatusProvider {
    address: String,
    query_timeout: Duration,
    max_frame_size: usize,
    ttl: Duration,
    cached: Mutex<Option<(Instant, ServerStatus)>>,
}

impl ForeignStatusProvider {
    pub fn new(address: impl Into<String>, options: &TcpOptions, ttl: Duration) -> Self {
        Self {
            address: address.into(),
            query_timeout: options.dial_timeout,
            max_frame_size: options.max_frame_size,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Ask the upstream for its status, bypassing the cache
    pub async fn query(&self) -> Result<ServerStatus, ConnError> {
        timeout(self.query_timeout, self.query_upstream())
            .await
            .map_err(|_| ConnError::Timeout(self.query_timeout))?
    }

    async fn query_upstream(&self) -> Result<ServerStatus, ConnError> {
        let mut stream = TcpStream::connect(self.address.as_str()).await?;
        codec::write_frame(&mut stream, &Packet::StatusRequest).await?;

        match codec::read_frame(&mut stream, self.max_frame_size).await? {
            Packet::StatusResponse(status) => Ok(status),
            Packet::Disconnect(notice) => Err(ConnError::Disconnected(notice.message)),
            other => Err(ConnError::UnexpectedPacket {
                expected: "StatusResponse",
                got: other.kind().name(),
            }),
        }
    }

    fn unreachable_status(&self) -> ServerStatus {
        ServerStatus {
            server_name: "Upstream unreachable".to_string(),
            sub_name: self.address.clone(),
            ..ServerStatus::default()
        }
    }
}

#[async_trait]
impl StatusProvider for ForeignStatusProvider {
    async fn server_status(&self) -> ServerStatus {
        let mut cached = self.cached.lock().await;
        if let Some((fetched_at, status)) = cached.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return status.clone();
            }
        }

        match self.query().await {
            Ok(status) => {
                debug!("Fetched status of upstream {}", self.address);
                *cached = Some((Instant::now(), status.clone()));
                status
            }
            Err(e) => {
                warn!("Failed to query status of upstream {}: {}", self.address, e);
                match cached.as_ref() {
                    Some((_, stale)) => stale.clone(),
                    None => self.unreachable_status(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn lobby(players: i32) -> ServerStatus {
        ServerStatus {
            server_name: "Lobby".to_string(),
            sub_name: "survival".to_string(),
            player_count: players,
            max_players: 20,
            show_version: true,
        }
    }

    /// Upstream answering every status query with `status`, counting queries
    async fn status_upstream(status: ServerStatus) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let queries = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&queries);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let request = codec::read_frame(&mut stream, 1024).await.unwrap();
                assert_eq!(request, Packet::StatusRequest);
                counter.fetch_add(1, Ordering::SeqCst);
                codec::write_frame(&mut stream, &Packet::StatusResponse(status.clone()))
                    .await
                    .unwrap();
            }
        });

        (address, queries)
    }

    #[tokio::test]
    async fn test_static_provider_reports_its_status() {
        let provider = StaticStatusProvider::new(lobby(1));
        assert_eq!(provider.server_status().await, lobby(1));
    }

    #[tokio::test]
    async fn test_foreign_provider_reports_upstream_status() {
        let (address, queries) = status_upstream(lobby(7)).await;
        let provider = ForeignStatusProvider::new(address, &TcpOptions::default(), DEFAULT_STATUS_TTL);

        assert_eq!(provider.server_status().await, lobby(7));
        assert_eq!(provider.server_status().await, lobby(7));
        assert_eq!(queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreign_provider_requeries_after_ttl() {
        let (address, queries) = status_upstream(lobby(2)).await;
        let provider =
            ForeignStatusProvider::new(address, &TcpOptions::default(), Duration::from_millis(50));

        provider.server_status().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        provider.server_status().await;
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_gets_placeholder() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let provider =
            ForeignStatusProvider::new(address.clone(), &TcpOptions::default(), DEFAULT_STATUS_TTL);
        let status = provider.server_status().await;
        assert_eq!(status.server_name, "Upstream unreachable");
        assert_eq!(status.sub_name, address);
        assert_eq!(status.max_players, 0);
    }
}
