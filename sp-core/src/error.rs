//! Error taxonomy for the SP messaging kernel.
//!
//! This is deliberately small. A handler's own `(state, src, event)` match
//! being non-exhaustive is a programming error proved by [`crate::fsm::fsm_violation`]
//! panicking, not a `Result` variant — `SpError` only carries conditions a
//! caller can act on: a transient link problem to retry past, a peer that
//! sent garbage, a policy limit tripped, or the socket/channel going away.

use std::io;
use thiserror::Error;

/// Main error type for SP socket operations.
#[derive(Error, Debug)]
pub enum SpError {
    /// Underlying I/O failure (accept/connect/read/write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A link-level failure that the connecting/accepted-side FSM is
    /// expected to recover from on its own (reconnect backoff, retry) rather
    /// than surface as fatal — reported so callers can observe it, not so
    /// they must react to it.
    #[error("transient link failure: {0}")]
    TransientLink(String),

    /// Peer disagreed on the wire protocol: bad SP magic, unsupported
    /// protocol id, malformed WebSocket upgrade, etc.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// A configured limit was exceeded (`max_msg_size`, frame length, etc).
    #[error("policy exceeded: {size} bytes (limit {max})")]
    PolicyExceeded { size: usize, max: usize },

    /// The peer is gone: clean close or reset after an established link.
    #[error("peer gone: {0}")]
    PeerGone(String),

    /// An internal channel (actor command/event queue) is closed.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type alias for SP socket operations.
pub type Result<T> = std::result::Result<T, SpError>;

impl SpError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientLink(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolMismatch(msg.into())
    }

    pub fn peer_gone(msg: impl Into<String>) -> Self {
        Self::PeerGone(msg.into())
    }

    pub fn policy_exceeded(size: usize, max: usize) -> Self {
        Self::PolicyExceeded { size, max }
    }

    /// Whether a connecting/accepted-side FSM should treat this as grounds
    /// for a reconnect attempt rather than a fatal teardown.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::TransientLink(_) => true,
            Self::ProtocolMismatch(_) | Self::PolicyExceeded { .. } | Self::ChannelClosed => false,
            Self::PeerGone(_) => true,
        }
    }

    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::PeerGone(_) | Self::TransientLink(_))
    }
}
