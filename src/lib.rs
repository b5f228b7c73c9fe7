//! Packet Relay Library
//!
//! Transparent man-in-the-middle relay for packetized game sessions: every
//! accepted client is paired with its own upstream connection, packets are
//! pumped both ways unchanged, and each one passes an observer hook on the
//! way through.

pub mod auth;
pub mod config;
pub mod connection;
pub mod observer;
pub mod protocol;
pub mod relay;
pub mod shutdown;
pub mod transport;

pub use config::Config;
pub use connection::ConnectionManager;
pub use relay::Session;
pub use shutdown::ShutdownCoordinator;

/// Common error type for the relay
pub type Result<T> = anyhow::Result<T>;
