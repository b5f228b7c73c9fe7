//! Session Relay
//!
//! Pairs one client connection with one upstream connection and pumps
//! packets between them until either side fails.

pub mod session;
pub mod stats;

pub use session::{Session, SessionState, CONNECTION_LOST};
pub use stats::{SessionStats, SessionSummary};
