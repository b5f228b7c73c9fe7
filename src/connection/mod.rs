//! Connection Management
//!
//! Accept loop that turns every inbound client into a relay session.

pub mod manager;

pub use manager::{ConnectionManager, ConnectionStats};
