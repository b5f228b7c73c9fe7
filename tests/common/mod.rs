//! Shared test doubles: scripted connections, dialer, observers and auth
//! provider.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use packet_relay::auth::{AuthProvider, CredentialError, Token};
use packet_relay::observer::{Direction, PacketObserver};
use packet_relay::protocol::{ClientData, GameData, Packet, Vec3};
use packet_relay::transport::{
    ClientConn, ConnError, DialError, Dialer, PacketConn, PacketListener, UpstreamConn,
};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How writes on a mock connection should fail
#[derive(Debug, Clone)]
pub enum WriteFailure {
    Disconnect(String),
    Broken,
}

struct MockState {
    name: String,
    inbound_tx: mpsc::UnboundedSender<Result<Packet, ConnError>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<Packet, ConnError>>>,
    written: Mutex<Vec<Packet>>,
    written_count: watch::Sender<usize>,
    /// Writes fail once this many packets have been written
    write_failure: Mutex<Option<(usize, WriteFailure)>>,
    disconnects: Mutex<Vec<String>>,
    close_calls: AtomicUsize,
    closed: watch::Sender<bool>,
    client_data: ClientData,
    game_data: GameData,
    started_with: Mutex<Vec<GameData>>,
    spawn_calls: AtomicUsize,
    fail_start_game: AtomicBool,
    fail_spawn: AtomicBool,
}

/// Scripted connection usable in either role. Cloning yields another
/// handle to the same connection so tests can inspect it after handing it
/// to a session.
#[derive(Clone)]
pub struct MockConn(Arc<MockState>);

impl MockConn {
    pub fn new(name: &str) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (written_count, _) = watch::channel(0);
        let (closed, _) = watch::channel(false);

        Self(Arc::new(MockState {
            name: name.to_string(),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            written: Mutex::new(Vec::new()),
            written_count,
            write_failure: Mutex::new(None),
            disconnects: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            closed,
            client_data: client_data(name),
            game_data: game_data(name),
            started_with: Mutex::new(Vec::new()),
            spawn_calls: AtomicUsize::new(0),
            fail_start_game: AtomicBool::new(false),
            fail_spawn: AtomicBool::new(false),
        }))
    }

    /// Queue a packet for the relay to read
    pub fn push(&self, packet: Packet) {
        let _ = self.0.inbound_tx.send(Ok(packet));
    }

    /// Queue a read failure
    pub fn push_error(&self, error: ConnError) {
        let _ = self.0.inbound_tx.send(Err(error));
    }

    /// Queue a generic I/O read failure
    pub fn push_reset(&self) {
        self.push_error(ConnError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )));
    }

    pub fn fail_writes(&self, failure: WriteFailure) {
        self.fail_writes_after(0, failure);
    }

    pub fn fail_writes_after(&self, delivered: usize, failure: WriteFailure) {
        *self.0.write_failure.lock().unwrap() = Some((delivered, failure));
    }

    pub fn fail_start_game(&self) {
        self.0.fail_start_game.store(true, Ordering::SeqCst);
    }

    pub fn fail_spawn(&self) {
        self.0.fail_spawn.store(true, Ordering::SeqCst);
    }

    /// Packets the relay wrote to this connection
    pub fn written(&self) -> Vec<Packet> {
        self.0.written.lock().unwrap().clone()
    }

    /// Wait until at least `count` packets have been written
    pub async fn wait_for_written(&self, count: usize) {
        let mut rx = self.0.written_count.subscribe();
        tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|n| *n >= count))
            .await
            .unwrap_or_else(|_| panic!("{}: timed out waiting for {} writes", self.0.name, count))
            .unwrap();
    }

    /// Wait until the relay has closed or disconnected this connection
    pub async fn wait_closed(&self) {
        let mut rx = self.0.closed.subscribe();
        tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|closed| *closed))
            .await
            .unwrap_or_else(|_| panic!("{}: timed out waiting for close", self.0.name))
            .unwrap();
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.0.disconnects.lock().unwrap().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.0.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *self.0.closed.borrow()
    }

    pub fn started_with(&self) -> Vec<GameData> {
        self.0.started_with.lock().unwrap().clone()
    }

    pub fn spawn_calls(&self) -> usize {
        self.0.spawn_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PacketConn for MockConn {
    async fn read_packet(&self) -> Result<Packet, ConnError> {
        let mut closed = self.0.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnError::Closed);
        }

        let mut inbound = self.0.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(ConnError::Closed),
            next = inbound.recv() => next.unwrap_or(Err(ConnError::Closed)),
        }
    }

    async fn write_packet(&self, packet: &Packet) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        let delivered = self.0.written.lock().unwrap().len();
        let failure = self
            .0
            .write_failure
            .lock()
            .unwrap()
            .clone()
            .filter(|(after, _)| delivered >= *after)
            .map(|(_, failure)| failure);
        match failure {
            Some(WriteFailure::Disconnect(reason)) => Err(ConnError::Disconnected(reason)),
            Some(WriteFailure::Broken) => Err(ConnError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))),
            None => {
                self.0.written.lock().unwrap().push(packet.clone());
                self.0.written_count.send_modify(|n| *n += 1);
                Ok(())
            }
        }
    }

    async fn disconnect(&self, reason: &str) {
        self.0.disconnects.lock().unwrap().push(reason.to_string());
        self.0.closed.send_replace(true);
    }

    async fn close(&self) {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
        self.0.closed.send_replace(true);
    }

    fn peer(&self) -> String {
        self.0.name.clone()
    }
}

#[async_trait]
impl ClientConn for MockConn {
    fn client_data(&self) -> &ClientData {
        &self.0.client_data
    }

    async fn start_game(&self, game_data: &GameData) -> Result<(), ConnError> {
        self.0.started_with.lock().unwrap().push(game_data.clone());
        if self.0.fail_start_game.load(Ordering::SeqCst) {
            return Err(ConnError::Timeout(Duration::from_secs(1)));
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamConn for MockConn {
    fn game_data(&self) -> &GameData {
        &self.0.game_data
    }

    async fn do_spawn(&self) -> Result<(), ConnError> {
        self.0.spawn_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_spawn.load(Ordering::SeqCst) {
            return Err(ConnError::Closed);
        }
        Ok(())
    }
}

pub fn client_data(name: &str) -> ClientData {
    ClientData {
        display_name: name.to_string(),
        game_version: "1.20.0".to_string(),
        device_os: "Android".to_string(),
        device_id: format!("device-{}", name),
        language_code: "en_US".to_string(),
        skin_id: None,
    }
}

pub fn game_data(name: &str) -> GameData {
    GameData {
        world_name: format!("world-{}", name),
        entity_unique_id: -7,
        entity_runtime_id: 7,
        game_mode: 1,
        dimension: 0,
        player_position: Vec3::new(0.0, 70.0, 0.0),
        ..GameData::default()
    }
}

struct ListenerState {
    incoming_tx: mpsc::UnboundedSender<Result<MockConn, ConnError>>,
    incoming_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<MockConn, ConnError>>>,
    closed: watch::Sender<bool>,
}

/// Listener yielding scripted accept results in order
#[derive(Clone)]
pub struct MockListener(Arc<ListenerState>);

impl MockListener {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self(Arc::new(ListenerState {
            incoming_tx,
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
            closed,
        }))
    }

    pub fn push_client(&self, client: MockConn) {
        let _ = self.0.incoming_tx.send(Ok(client));
    }

    pub fn push_error(&self, error: ConnError) {
        let _ = self.0.incoming_tx.send(Err(error));
    }

    pub fn is_closed(&self) -> bool {
        *self.0.closed.borrow()
    }
}

#[async_trait]
impl PacketListener for MockListener {
    type Conn = MockConn;

    async fn accept(&self) -> Result<MockConn, ConnError> {
        let mut closed = self.0.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ConnError::Closed);
        }

        let mut incoming = self.0.incoming_rx.lock().await;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(ConnError::Closed),
            next = incoming.recv() => next.unwrap_or(Err(ConnError::Closed)),
        }
    }

    fn close(&self) {
        self.0.closed.send_replace(true);
    }
}

/// Dialer handing out one prepared upstream, or rejecting
pub struct MockDialer {
    upstream: Mutex<Option<MockConn>>,
    reject_with: Option<String>,
    pub identities: Mutex<Vec<ClientData>>,
    pub tokens: Mutex<Vec<Token>>,
    pub addresses: Mutex<Vec<String>>,
}

impl MockDialer {
    pub fn returning(upstream: MockConn) -> Self {
        Self {
            upstream: Mutex::new(Some(upstream)),
            reject_with: None,
            identities: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            addresses: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            upstream: Mutex::new(None),
            reject_with: Some(reason.to_string()),
            identities: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            addresses: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Dialer for MockDialer {
    type Conn = MockConn;

    async fn dial(
        &self,
        address: &str,
        identity: &ClientData,
        token: &Token,
    ) -> Result<MockConn, DialError> {
        self.addresses.lock().unwrap().push(address.to_string());
        self.identities.lock().unwrap().push(identity.clone());
        self.tokens.lock().unwrap().push(token.clone());

        if let Some(reason) = &self.reject_with {
            return Err(DialError::Rejected(reason.clone()));
        }
        self.upstream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DialError::Rejected("no upstream prepared".to_string()))
    }
}

/// Observer keeping every packet it sees
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(Direction, Packet)>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<(Direction, Packet)> {
        self.seen.lock().unwrap().clone()
    }
}

impl PacketObserver for RecordingObserver {
    fn observe(&self, direction: Direction, packet: &Packet) {
        self.seen.lock().unwrap().push((direction, packet.clone()));
    }
}

/// Observer that fails on every packet
pub struct PanickingObserver;

impl PacketObserver for PanickingObserver {
    fn observe(&self, _direction: Direction, _packet: &Packet) {
        panic!("observer failure");
    }
}

/// Auth provider with scripted outcomes and call counters
pub struct MockAuthProvider {
    interactive_token: Option<Token>,
    renewal: Option<Token>,
    pub interactive_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl MockAuthProvider {
    /// Interactive login succeeds with `token`
    pub fn granting(token: Token) -> Self {
        Self {
            interactive_token: Some(token),
            renewal: None,
            interactive_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Interactive login is aborted by the operator
    pub fn aborting() -> Self {
        Self {
            interactive_token: None,
            renewal: None,
            interactive_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// Interactive login grants `token`; expired tokens renew to `renewal`
    pub fn renewing(token: Token, renewal: Token) -> Self {
        Self {
            interactive_token: Some(token),
            renewal: Some(renewal),
            interactive_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn obtain_interactive(&self) -> Result<Token, CredentialError> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        self.interactive_token
            .clone()
            .ok_or_else(|| CredentialError::Aborted("operator cancelled".to_string()))
    }

    async fn refresh(&self, token: &Token) -> Result<Token, CredentialError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if token.is_valid() {
            return Ok(token.clone());
        }
        self.renewal.clone().ok_or(CredentialError::Expired)
    }
}
