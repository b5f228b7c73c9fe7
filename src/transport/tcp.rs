//! TCP Transport
//!
//! Length-prefixed packet framing over TCP. Inbound login exchanges run in
//! their own tasks so a slow client never holds up the accept path. A
//! connection that opens with a status request instead of a login is
//! answered from the listener's `StatusProvider` and closed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::codec::{self, DEFAULT_MAX_FRAME_SIZE};
use super::{
    ClientConn, ConnError, DialError, Dialer, PacketConn, PacketListener, StatusProvider,
    UpstreamConn,
};
use crate::auth::Token;
use crate::protocol::{
    ClientData, GameData, Login, Packet, PlayStatus, PlayStatusCode, RequestChunkRadius,
};

/// Tuning knobs for the TCP transport
#[derive(Debug, Clone)]
pub struct TcpOptions {
    pub max_frame_size: usize,
    pub login_timeout: Duration,
    pub dial_timeout: Duration,
    pub chunk_radius: i32,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            login_timeout: Duration::from_secs(10),
            dial_timeout: Duration::from_secs(10),
            chunk_radius: 16,
        }
    }
}

/// First delay after a failed accept
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
/// Ceiling for the accept retry delay
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Framed TCP stream shared by both connection roles.
///
/// The read half and the write half sit behind separate locks so one task
/// can block in a read while another writes. Closing flips a watch flag that
/// wakes any blocked reader or writer.
struct FramedConn {
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    /// Set when closing cut a frame short; the stream can no longer carry
    /// another frame
    write_interrupted: AtomicBool,
    max_frame_size: usize,
}

impl FramedConn {
    fn new(stream: TcpStream, max_frame_size: usize) -> Result<Self, ConnError> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Ok(Self {
            peer,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed,
            write_interrupted: AtomicBool::new(false),
            max_frame_size,
        })
    }

    async fn read(&self) -> Result<Packet, ConnError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnError::Closed);
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(ConnError::Closed),
            result = codec::read_frame(&mut *reader, self.max_frame_size) => match result {
                Ok(Packet::Disconnect(notice)) => Err(ConnError::Disconnected(notice.message)),
                other => other,
            },
        }
    }

    async fn write(&self, packet: &Packet) -> Result<(), ConnError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnError::Closed);
        }

        let mut writer = self.writer.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                self.write_interrupted.store(true, Ordering::SeqCst);
                Err(ConnError::Closed)
            }
            result = codec::write_frame(&mut *writer, packet) => result,
        }
    }

    /// Returns true for the call that actually closed the connection
    fn mark_closed(&self) -> bool {
        !self.closed.send_replace(true)
    }

    async fn disconnect(&self, reason: &str) {
        if !self.mark_closed() {
            return;
        }

        let mut writer = self.writer.lock().await;
        if self.write_interrupted.load(Ordering::SeqCst) {
            debug!(
                "Not sending disconnect to {}: a frame was cut short",
                self.peer
            );
        } else if let Err(e) =
            codec::write_frame(&mut *writer, &Packet::disconnect(reason)).await
        {
            debug!("Failed to send disconnect to {}: {}", self.peer, e);
        }
        let _ = writer.shutdown().await;
    }

    async fn close(&self) {
        if !self.mark_closed() {
            return;
        }

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Logged-in game client
pub struct TcpClientConn {
    conn: FramedConn,
    client_data: ClientData,
}

#[async_trait]
impl PacketConn for TcpClientConn {
    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.conn.read().await
    }

    async fn write_packet(&self, packet: &Packet) -> Result<(), ConnError> {
        self.conn.write(packet).await
    }

    async fn disconnect(&self, reason: &str) {
        self.conn.disconnect(reason).await
    }

    async fn close(&self) {
        self.conn.close().await
    }

    fn peer(&self) -> String {
        format!("{} ({})", self.conn.peer, self.client_data.display_name)
    }
}

#[async_trait]
impl ClientConn for TcpClientConn {
    fn client_data(&self) -> &ClientData {
        &self.client_data
    }

    async fn start_game(&self, game_data: &GameData) -> Result<(), ConnError> {
        self.conn
            .write(&Packet::StartGame(Box::new(game_data.clone())))
            .await?;
        self.conn
            .write(&Packet::PlayStatus(PlayStatus {
                status: PlayStatusCode::PlayerSpawn,
            }))
            .await
    }
}

/// Connection to the real server
pub struct TcpUpstreamConn {
    conn: FramedConn,
    game_data: GameData,
    chunk_radius: i32,
}

#[async_trait]
impl PacketConn for TcpUpstreamConn {
    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.conn.read().await
    }

    async fn write_packet(&self, packet: &Packet) -> Result<(), ConnError> {
        self.conn.write(packet).await
    }

    async fn disconnect(&self, reason: &str) {
        self.conn.disconnect(reason).await
    }

    async fn close(&self) {
        self.conn.close().await
    }

    fn peer(&self) -> String {
        self.conn.peer.to_string()
    }
}

#[async_trait]
impl UpstreamConn for TcpUpstreamConn {
    fn game_data(&self) -> &GameData {
        &self.game_data
    }

    async fn do_spawn(&self) -> Result<(), ConnError> {
        self.conn
            .write(&Packet::RequestChunkRadius(RequestChunkRadius {
                chunk_radius: self.chunk_radius,
            }))
            .await
    }
}

/// Listener yielding logged-in clients
pub struct TcpPacketListener {
    local_addr: SocketAddr,
    incoming: Mutex<mpsc::Receiver<Result<TcpClientConn, ConnError>>>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl TcpPacketListener {
    /// Bind and start accepting in the background. Status queries are
    /// answered from `status`.
    pub async fn bind(
        addr: SocketAddr,
        options: TcpOptions,
        status: Arc<dyn StatusProvider>,
    ) -> Result<Self, ConnError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening for clients on {}", local_addr);

        let (tx, rx) = mpsc::channel(64);
        let accept_task = tokio::spawn(accept_clients(listener, tx, options, status));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            local_addr,
            incoming: Mutex::new(rx),
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpPacketListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl PacketListener for TcpPacketListener {
    type Conn = TcpClientConn;

    async fn accept(&self) -> Result<TcpClientConn, ConnError> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Err(ConnError::Closed);
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => Err(ConnError::Closed),
            next = incoming.recv() => next.unwrap_or(Err(ConnError::Closed)),
        }
    }

    fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Closing listener on {}", self.local_addr);
        }
        self.accept_task.abort();
    }
}

/// Exponential delay between retries after consecutive accept failures
#[derive(Debug)]
struct AcceptBackoff {
    current: Duration,
}

impl AcceptBackoff {
    fn new() -> Self {
        Self {
            current: Duration::ZERO,
        }
    }

    fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            ACCEPT_BACKOFF_MIN
        } else {
            (self.current * 2).min(ACCEPT_BACKOFF_MAX)
        };
        self.current
    }

    fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

async fn accept_clients(
    listener: TcpListener,
    tx: mpsc::Sender<Result<TcpClientConn, ConnError>>,
    options: TcpOptions,
    status: Arc<dyn StatusProvider>,
) {
    let mut backoff = AcceptBackoff::new();
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                backoff.reset();
                debug!("Accepted TCP connection from {}", addr);
                let tx = tx.clone();
                let options = options.clone();
                let status = Arc::clone(&status);
                tokio::spawn(async move {
                    match client_login(stream, &options, &*status).await {
                        Ok(Some(client)) => {
                            let _ = tx.send(Ok(client)).await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!("Login exchange with {} failed: {}", addr, e);
                            let _ = tx.send(Err(e)).await;
                        }
                    }
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                debug!("TCP accept failed, retrying in {:?}: {}", delay, e);
                if tx.send(Err(e.into())).await.is_err() {
                    break;
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Run the opening exchange on an inbound connection. `None` means it was a
/// status query that has already been answered.
async fn client_login(
    stream: TcpStream,
    options: &TcpOptions,
    status: &dyn StatusProvider,
) -> Result<Option<TcpClientConn>, ConnError> {
    let conn = FramedConn::new(stream, options.max_frame_size)?;

    let first = timeout(options.login_timeout, conn.read())
        .await
        .map_err(|_| ConnError::Timeout(options.login_timeout))??;

    match first {
        Packet::Login(login) => {
            debug!(
                "Client {} logged in as {}",
                conn.peer, login.client_data.display_name
            );
            Ok(Some(TcpClientConn {
                conn,
                client_data: login.client_data,
            }))
        }
        Packet::StatusRequest => {
            let status = status.server_status().await;
            debug!(
                "Answering status query from {} with {:?}",
                conn.peer, status.server_name
            );
            conn.write(&Packet::StatusResponse(status)).await?;
            conn.close().await;
            Ok(None)
        }
        other => {
            conn.disconnect("expected login").await;
            Err(ConnError::UnexpectedPacket {
                expected: "Login",
                got: other.kind().name(),
            })
        }
    }
}

/// Dials upstream servers over TCP
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    options: TcpOptions,
}

impl TcpDialer {
    pub fn new(options: TcpOptions) -> Self {
        Self { options }
    }

    async fn dial_inner(
        &self,
        address: &str,
        identity: &ClientData,
        token: &Token,
    ) -> Result<TcpUpstreamConn, DialError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| DialError::Unreachable {
                address: address.to_string(),
                source,
            })?;
        let conn = FramedConn::new(stream, self.options.max_frame_size)?;

        conn.write(&Packet::Login(Login {
            client_data: identity.clone(),
            access_token: Some(token.access_token.clone()),
        }))
        .await?;

        match conn.read().await {
            Ok(Packet::StartGame(game_data)) => Ok(TcpUpstreamConn {
                conn,
                game_data: *game_data,
                chunk_radius: self.options.chunk_radius,
            }),
            Ok(other) => {
                conn.close().await;
                Err(DialError::Handshake(ConnError::UnexpectedPacket {
                    expected: "StartGame",
                    got: other.kind().name(),
                }))
            }
            Err(ConnError::Disconnected(reason)) => Err(DialError::Rejected(reason)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpUpstreamConn;

    async fn dial(
        &self,
        address: &str,
        identity: &ClientData,
        token: &Token,
    ) -> Result<TcpUpstreamConn, DialError> {
        debug!("Dialing upstream {} for {}", address, identity.display_name);
        match timeout(self.options.dial_timeout, self.dial_inner(address, identity, token)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Dial to {} timed out after {:?}", address, self.options.dial_timeout);
                Err(DialError::Timeout(self.options.dial_timeout))
            }
        }
    }
}
