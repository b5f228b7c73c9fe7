//! Relay Session
//!
//! Lifecycle: `Connecting -> Handshaking -> Relaying -> Closing -> Closed`.
//!
//! Once relaying, two independent tasks each run a tight
//! read-observe-write cycle for one direction. Each connection is read by
//! exactly one of them and written by the other, so packet flow needs no
//! locking. Whichever loop fails first tears the pair down; teardown is
//! single-fire, so the other loop's follow-up failure is swallowed.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use super::{SessionStats, SessionSummary};
use crate::auth::Token;
use crate::observer::{Direction, PacketObserver};
use crate::protocol::Packet;
use crate::transport::{ClientConn, ConnError, DialError, Dialer, UpstreamConn};

/// Reason given to the client when the session ends without a specific one
pub const CONNECTION_LOST: &str = "connection lost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Relaying,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Relaying => "relaying",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One client paired with one upstream for its whole lifetime
pub struct Session<C, U> {
    inner: Arc<SessionInner<C, U>>,
}

struct SessionInner<C, U> {
    id: String,
    client: C,
    upstream: U,
    observer: Arc<dyn PacketObserver>,
    state: watch::Sender<SessionState>,
    /// Set exactly once, by whichever loop tears the session down
    close_reason: OnceLock<String>,
    stats: SessionStats,
}

impl<C, U> Session<C, U>
where
    C: ClientConn,
    U: UpstreamConn,
{
    /// Dial the upstream on behalf of a freshly accepted client.
    ///
    /// The client's declared identity is forwarded verbatim. If the dial
    /// fails the client connection is closed and no session is created.
    pub async fn connect<D>(
        client: C,
        dialer: &D,
        address: &str,
        token: &Token,
        observer: Arc<dyn PacketObserver>,
    ) -> Result<Self, DialError>
    where
        D: Dialer<Conn = U>,
    {
        debug!("Connecting {} to upstream {}", client.peer(), address);

        match dialer.dial(address, client.client_data(), token).await {
            Ok(upstream) => {
                info!("Connected {} to upstream {}", client.peer(), upstream.peer());
                Ok(Self::new(client, upstream, observer))
            }
            Err(e) => {
                warn!("Failed to dial upstream {} for {}: {}", address, client.peer(), e);
                client.close().await;
                Err(e)
            }
        }
    }

    /// Pair two already established connections
    pub fn new(client: C, upstream: U, observer: Arc<dyn PacketObserver>) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                client,
                upstream,
                observer,
                state,
                close_reason: OnceLock::new(),
                stats: SessionStats::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions; outlives `run`
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Drive the session to completion: handshake, relay, teardown.
    #[instrument(
        name = "session",
        skip(self),
        fields(session_id = %self.inner.id, client = %self.inner.client.peer())
    )]
    pub async fn run(self) -> SessionSummary {
        let inner = self.inner;

        inner.handshake().await;

        inner.set_state(SessionState::Relaying);
        let mut loops = JoinSet::new();
        loops.spawn(
            Arc::clone(&inner)
                .relay_client_to_server()
                .in_current_span(),
        );
        loops.spawn(
            Arc::clone(&inner)
                .relay_server_to_client()
                .in_current_span(),
        );

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                error!("Relay loop aborted: {}", e);
                inner.teardown(None).await;
            }
        }

        inner.set_state(SessionState::Closed);
        let summary = inner.summary();
        summary.log();
        summary
    }
}

impl<C, U> SessionInner<C, U>
where
    C: ClientConn,
    U: UpstreamConn,
{
    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        debug!("Session state {} -> {}", previous, state);
    }

    /// Start the game on the client and spawn on the upstream concurrently.
    /// Failures are logged; relaying starts either way.
    async fn handshake(&self) {
        self.set_state(SessionState::Handshaking);

        let game_data = self.upstream.game_data();
        let (started, spawned) = tokio::join!(
            self.client.start_game(game_data),
            self.upstream.do_spawn()
        );

        if let Err(e) = started {
            warn!("An error occurred whilst starting game: {}", e);
        }
        if let Err(e) = spawned {
            warn!("An error occurred whilst spawning: {}", e);
        }
    }

    async fn relay_client_to_server(self: Arc<Self>) {
        loop {
            let packet = match self.client.read_packet().await {
                Ok(packet) => packet,
                Err(e) => {
                    self.note_loop_exit("reading from client", &e);
                    self.teardown(None).await;
                    return;
                }
            };

            self.observe(Direction::Client, &packet);

            if let Err(e) = self.upstream.write_packet(&packet).await {
                self.note_loop_exit("writing to upstream", &e);
                self.teardown(e.disconnect_reason().map(str::to_owned)).await;
                return;
            }
            self.stats.record(Direction::Client);
        }
    }

    async fn relay_server_to_client(self: Arc<Self>) {
        loop {
            let packet = match self.upstream.read_packet().await {
                Ok(packet) => packet,
                Err(e) => {
                    self.note_loop_exit("reading from upstream", &e);
                    self.teardown(e.disconnect_reason().map(str::to_owned)).await;
                    return;
                }
            };

            self.observe(Direction::Server, &packet);

            if let Err(e) = self.client.write_packet(&packet).await {
                self.note_loop_exit("writing to client", &e);
                self.teardown(None).await;
                return;
            }
            self.stats.record(Direction::Server);
        }
    }

    /// Run the observer, swallowing any panic it raises
    fn observe(&self, direction: Direction, packet: &Packet) {
        let observer = &self.observer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.observe(direction, packet)));
        if outcome.is_err() {
            warn!(
                "Packet observer panicked on {} packet from {}",
                packet.kind(),
                direction
            );
        }
    }

    fn note_loop_exit(&self, action: &str, error: &ConnError) {
        if self.close_reason.get().is_some() {
            debug!("Stopped {} after teardown: {}", action, error);
        } else {
            info!("Stopped {}: {}", action, error);
        }
    }

    /// Close both connections exactly once.
    ///
    /// The upstream is closed silently; the client is told `reason`, or
    /// the generic "connection lost" when there is none.
    async fn teardown(&self, reason: Option<String>) {
        let reason = reason.unwrap_or_else(|| CONNECTION_LOST.to_string());
        if self.close_reason.set(reason.clone()).is_err() {
            return;
        }

        self.set_state(SessionState::Closing);
        info!("Closing session: {}", reason);

        self.upstream.close().await;
        self.client.disconnect(&reason).await;
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            client: self.client.peer(),
            upstream: self.upstream.peer(),
            duration_ms: self.stats.duration().as_millis() as u64,
            packets_from_client: self.stats.packets_from_client(),
            packets_from_server: self.stats.packets_from_server(),
            close_reason: self.close_reason.get().cloned(),
        }
    }
}
