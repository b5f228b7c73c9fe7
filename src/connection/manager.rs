//! Connection Manager Implementation

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialManager;
use crate::observer::PacketObserver;
use crate::relay::Session;
use crate::transport::{ConnError, Dialer, PacketConn, PacketListener};
use crate::Result;

/// Accepts clients and runs one session per client
pub struct ConnectionManager<L, D> {
    listener: Arc<L>,
    dialer: Arc<D>,
    credentials: Arc<CredentialManager>,
    observer: Arc<dyn PacketObserver>,
    upstream_addr: Arc<str>,
    active_sessions: Arc<AtomicUsize>,
    total_sessions: AtomicUsize,
    shutdown_flag: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// Keeps the active session count accurate however a session task ends
struct SessionSlot {
    active_sessions: Arc<AtomicUsize>,
}

impl SessionSlot {
    fn acquire(active_sessions: &Arc<AtomicUsize>) -> Self {
        active_sessions.fetch_add(1, Ordering::Relaxed);
        Self {
            active_sessions: Arc::clone(active_sessions),
        }
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<L, D> ConnectionManager<L, D>
where
    L: PacketListener,
    D: Dialer,
{
    pub fn new(
        listener: L,
        dialer: D,
        credentials: Arc<CredentialManager>,
        observer: Arc<dyn PacketObserver>,
        upstream_addr: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let upstream_addr: String = upstream_addr.into();

        Self {
            listener: Arc::new(listener),
            dialer: Arc::new(dialer),
            credentials,
            observer,
            upstream_addr: Arc::from(upstream_addr),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            total_sessions: AtomicUsize::new(0),
            shutdown_flag: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Accept clients until the listener closes or shutdown is requested.
    ///
    /// Accept failures are logged and do not stop the loop.
    pub async fn run(&self) -> Result<()> {
        info!("Relaying clients to upstream {}", self.upstream_addr);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                info!("Shutdown flag set, stopping connection acceptance");
                break;
            }

            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok(client) => self.spawn_session(client),
                        Err(ConnError::Closed) => {
                            info!("Listener closed, stopping connection acceptance");
                            break;
                        }
                        Err(e) => {
                            error!("An error occurred whilst accepting client: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    break;
                }
            }
        }

        info!(
            "Connection acceptance loop stopped ({} sessions still active)",
            self.active_sessions()
        );
        Ok(())
    }

    fn spawn_session(&self, client: L::Conn) {
        let session_number = self.total_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = SessionSlot::acquire(&self.active_sessions);
        let dialer = Arc::clone(&self.dialer);
        let credentials = Arc::clone(&self.credentials);
        let observer = Arc::clone(&self.observer);
        let upstream_addr = Arc::clone(&self.upstream_addr);

        let peer = client.peer();
        debug!("Accepted client #{} from {}", session_number, peer);

        tokio::spawn(async move {
            let _slot = slot;

            let token = credentials.token().await;

            match Session::connect(client, &*dialer, &upstream_addr, &token, observer).await {
                Ok(session) => {
                    session.run().await;
                }
                Err(e) => {
                    error!("An error occurred whilst handling client {}: {}", peer, e);
                }
            }
        });
    }

    /// Number of sessions currently running
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Total number of clients accepted so far
    pub fn total_sessions(&self) -> usize {
        self.total_sessions.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            active_sessions: self.active_sessions(),
            total_sessions_served: self.total_sessions(),
        }
    }

    /// Close the listener and stop the accept loop. Sessions already
    /// running are left to end with the process.
    pub fn initiate_shutdown(&self) {
        if self.shutdown_flag.swap(true, Ordering::Relaxed) {
            return;
        }
        info!("Initiating shutdown of connection manager");
        self.listener.close();

        if let Err(e) = self.shutdown_tx.send(()) {
            debug!("No accept loop listening for shutdown: {}", e);
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }
}

impl<L, D> Drop for ConnectionManager<L, D> {
    fn drop(&mut self) {
        let active = self.active_sessions.load(Ordering::Relaxed);
        if active > 0 {
            warn!("Connection manager dropped with {} active sessions", active);
        }
    }
}

/// Accept loop counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub active_sessions: usize,
    pub total_sessions_served: usize,
}
