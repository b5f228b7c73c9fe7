//! Protocol Model
//!
//! Decoded packet representation shared by the transport, the relay session
//! and the observer hook.

pub mod classifier;
pub mod packet;
pub mod types;

pub use classifier::{classify, Classification};
pub use packet::{Packet, PacketKind};
pub use types::*;
