//! Transport Collaborators
//!
//! The relay core only talks to connections through the traits in this
//! module. `tcp` provides a length-prefixed TCP implementation used by the
//! binary and `status` answers server list pings; tests substitute scripted
//! in-memory connections.

pub mod codec;
pub mod error;
pub mod status;
pub mod tcp;

use async_trait::async_trait;

use crate::auth::Token;
use crate::protocol::{ClientData, GameData, Packet};

pub use error::{ConnError, DialError};
pub use status::{ForeignStatusProvider, StaticStatusProvider, StatusProvider, DEFAULT_STATUS_TTL};
pub use tcp::{TcpClientConn, TcpDialer, TcpOptions, TcpPacketListener, TcpUpstreamConn};

/// An ordered, bidirectional channel of decoded packets.
///
/// A connection is read by exactly one task and written by exactly one
/// other task, so implementations must allow a read and a write to be in
/// flight at the same time.
#[async_trait]
pub trait PacketConn: Send + Sync + 'static {
    /// Read the next packet. Blocks until a full packet arrives or the
    /// connection fails; a peer-initiated disconnect surfaces as
    /// `ConnError::Disconnected`.
    async fn read_packet(&self) -> Result<Packet, ConnError>;

    /// Write one packet to the peer
    async fn write_packet(&self, packet: &Packet) -> Result<(), ConnError>;

    /// Tell the peer why the connection is ending, then close it
    async fn disconnect(&self, reason: &str);

    /// Close the connection without a reason
    async fn close(&self);

    /// Human-readable description of the remote end
    fn peer(&self) -> String;
}

/// Connection accepted from a game client (the relay acts as its server)
#[async_trait]
pub trait ClientConn: PacketConn {
    /// Identity the client declared at login
    fn client_data(&self) -> &ClientData;

    /// Tell the client the game has started, using upstream game data
    async fn start_game(&self, game_data: &GameData) -> Result<(), ConnError>;
}

/// Connection dialed to the real server (the relay acts as its client)
#[async_trait]
pub trait UpstreamConn: PacketConn {
    /// World state the upstream handed out during login
    fn game_data(&self) -> &GameData;

    /// Complete the upstream's spawn sequence
    async fn do_spawn(&self) -> Result<(), ConnError>;
}

/// Source of inbound client connections
#[async_trait]
pub trait PacketListener: Send + Sync + 'static {
    type Conn: ClientConn;

    /// Wait for the next logged-in client. `ConnError::Closed` means the
    /// listener has been shut down and will not yield further connections.
    async fn accept(&self) -> Result<Self::Conn, ConnError>;

    /// Stop accepting connections
    fn close(&self);
}

/// Establishes upstream connections
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Conn: UpstreamConn;

    async fn dial(
        &self,
        address: &str,
        identity: &ClientData,
        token: &Token,
    ) -> Result<Self::Conn, DialError>;
}
