//! Endpoint event monitoring.
//!
//! Provides an event stream mirroring the counters the design calls out as
//! observable on an endpoint (`ep_stat_increment`): in-progress, established,
//! dropped, broken, and connect-error. The socket layer folds this stream
//! into counters; it never tears down a peer endpoint in response to it.

use crate::endpoint::Endpoint;
use std::fmt;

/// Endpoint lifecycle events, one per `ep_stat_increment` counter plus the
/// bind-side events a listening endpoint also needs to report.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// A connect attempt started (counted as "in-progress").
    InProgress(Endpoint),

    /// The link was established (handshake completed).
    Established(Endpoint),

    /// The link was dropped by the local side (clean teardown).
    Dropped(Endpoint),

    /// The link broke (I/O error, protocol mismatch, peer reset).
    Broken { endpoint: Endpoint, reason: String },

    /// A connect attempt failed before the link was established.
    ConnectError { endpoint: Endpoint, reason: String },

    /// Endpoint successfully bound.
    Bound(Endpoint),

    /// Bind operation failed.
    BindFailed { endpoint: Endpoint, reason: String },

    /// Endpoint is listening for incoming connections.
    Listening(Endpoint),

    /// Endpoint accepted a new incoming connection.
    Accepted(Endpoint),
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress(ep) => write!(f, "connecting to {ep}"),
            Self::Established(ep) => write!(f, "established {ep}"),
            Self::Dropped(ep) => write!(f, "dropped {ep}"),
            Self::Broken { endpoint, reason } => write!(f, "broken {endpoint}: {reason}"),
            Self::ConnectError { endpoint, reason } => {
                write!(f, "connect error for {endpoint}: {reason}")
            }
            Self::Bound(ep) => write!(f, "bound to {ep}"),
            Self::BindFailed { endpoint, reason } => {
                write!(f, "bind failed for {endpoint}: {reason}")
            }
            Self::Listening(ep) => write!(f, "listening on {ep}"),
            Self::Accepted(ep) => write!(f, "accepted connection from {ep}"),
        }
    }
}

/// Handle for receiving endpoint events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Internal sender for endpoint events, exposed so transport implementations
/// can emit them.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_socket_event_display() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let event = SocketEvent::Established(Endpoint::Tcp(addr));
        assert_eq!(event.to_string(), "established tcp://127.0.0.1:5555");
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        sender.send(SocketEvent::InProgress(Endpoint::Tcp(addr))).unwrap();

        let event = receiver.recv().unwrap();
        assert!(matches!(event, SocketEvent::InProgress(_)));
    }
}
