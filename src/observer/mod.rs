//! Observer Hook
//!
//! Inspection callback invoked inline for every relayed packet.

pub mod logging;

use std::fmt;

use crate::protocol::Packet;

pub use logging::{LoggingObserver, PacketRecord, RecordDetails};

/// Side of the session a packet was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Read from the client, headed upstream
    Client,
    /// Read from the upstream, headed to the client
    Server,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Client => f.write_str("client"),
            Direction::Server => f.write_str("server"),
        }
    }
}

/// Per-packet inspection callback.
///
/// Called synchronously between reading a packet and forwarding it, so it
/// adds latency to its direction but can never reorder packets. It has no
/// way to fail the relay.
pub trait PacketObserver: Send + Sync {
    fn observe(&self, direction: Direction, packet: &Packet);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PacketObserver for NullObserver {
    fn observe(&self, _direction: Direction, _packet: &Packet) {}
}
