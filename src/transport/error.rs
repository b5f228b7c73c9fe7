//! Transport Error Types

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Per-connection failure
#[derive(Debug, Error)]
pub enum ConnError {
    /// The peer explicitly ended the connection and said why
    #[error("disconnected by remote: {0}")]
    Disconnected(String),

    /// The connection was closed locally or the peer went away
    #[error("connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed packet: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("unexpected {got} packet, expected {expected}")]
    UnexpectedPacket {
        expected: &'static str,
        got: &'static str,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ConnError {
    /// Reason carried by a remote disconnect, if this is one
    pub fn disconnect_reason(&self) -> Option<&str> {
        match self {
            ConnError::Disconnected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Failure to establish an upstream connection
#[derive(Debug, Error)]
pub enum DialError {
    #[error("upstream {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("upstream rejected login: {0}")]
    Rejected(String),

    #[error("dial timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream login exchange failed: {0}")]
    Handshake(#[from] ConnError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_remote_disconnect_carries_reason() {
        assert_eq!(
            ConnError::Disconnected("server closed".into()).disconnect_reason(),
            Some("server closed")
        );
        assert_eq!(ConnError::Closed.disconnect_reason(), None);
        let io_err = ConnError::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(io_err.disconnect_reason(), None);
    }
}
