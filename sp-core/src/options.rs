//! Socket configuration options.
//!
//! Mirrors the knob surface nanomsg exposes via `nn_setsockopt`/
//! `nn_getsockopt` for the transports and protocol overlays this crate
//! implements — stream (`NN_SNDBUF`/`NN_RCVBUF`/`NN_RCVMAXSIZE`), TCP
//! (`NN_TCP_NODELAY`), IPv4/IPv6 selection (`NN_IPV4ONLY`), reconnect backoff
//! (`NN_RECONNECT_IVL`/`NN_RECONNECT_IVL_MAX`), and the REQ/SURVEYOR timers
//! (`NN_REQ_RESEND_IVL`/`NN_SURVEYOR_DEADLINE`).

use std::time::Duration;

/// WebSocket application-message framing: binary or text opcode
/// (`NN_WS_MSG_TYPE_{TEXT,BINARY}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsMsgType {
    Text,
    Binary,
}

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use sp_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(50))
///     .with_reconnect_ivl_max(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Handshake timeout (StreamHdr completion deadline).
    /// - Default: 1000ms, matching upstream's `NN_STREAMHDR` timer.
    pub handshake_timeout: Duration,

    /// Initial reconnection delay after connection loss (`NN_RECONNECT_IVL`).
    /// - Default: 100ms.
    pub reconnect_ivl: Duration,

    /// Maximum reconnection delay for exponential backoff
    /// (`NN_RECONNECT_IVL_MAX`).
    /// - Default: `Duration::ZERO`, meaning "never grow past `reconnect_ivl`".
    pub reconnect_ivl_max: Duration,

    /// Maximum accepted message size in bytes (`NN_RCVMAXSIZE`).
    /// - `None`: no limit (default).
    pub max_msg_size: Option<usize>,

    /// Socket-level send buffer size, passed to the OS socket
    /// (`NN_SNDBUF`).
    pub send_buffer_size: usize,

    /// Socket-level receive buffer size, passed to the OS socket
    /// (`NN_RCVBUF`).
    pub recv_buffer_size: usize,

    /// Disable Nagle's algorithm on TCP transports (`NN_TCP_NODELAY`).
    pub tcp_nodelay: bool,

    /// Restrict TCP/WS binds and connects to IPv4 only (`NN_IPV4ONLY`).
    pub ipv4_only: bool,

    /// REQ resend interval: how long an ACTIVE request waits for a reply
    /// before re-sending and restarting its timer (`NN_REQ_RESEND_IVL`).
    /// - Default: 60000ms, matching upstream `req.c`.
    pub req_resend_ivl: Duration,

    /// SURVEYOR deadline: how long a survey stays open for responses before
    /// the overlay raises `Timeout` (`NN_SURVEYOR_DEADLINE`).
    /// - Default: 1000ms, matching upstream `surveyor.c`.
    pub surveyor_deadline: Duration,

    /// Binary or text opcode for outgoing WebSocket data frames
    /// (`NN_WS_MSG_TYPE`). Has no effect on TCP/IPC transports.
    /// - Default: `Binary`.
    pub ws_msg_type: WsMsgType,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(1000),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            max_msg_size: None,
            send_buffer_size: 128 * 1024,
            recv_buffer_size: 128 * 1024,
            tcp_nodelay: false,
            ipv4_only: false,
            req_resend_ivl: Duration::from_millis(60_000),
            surveyor_deadline: Duration::from_millis(1000),
            ws_msg_type: WsMsgType::Binary,
        }
    }
}

impl SocketOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    pub fn with_max_msg_size(mut self, size: Option<usize>) -> Self {
        self.max_msg_size = size;
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn with_ipv4_only(mut self, enabled: bool) -> Self {
        self.ipv4_only = enabled;
        self
    }

    pub fn with_req_resend_ivl(mut self, ivl: Duration) -> Self {
        self.req_resend_ivl = ivl;
        self
    }

    pub fn with_surveyor_deadline(mut self, deadline: Duration) -> Self {
        self.surveyor_deadline = deadline;
        self
    }

    pub fn with_ws_msg_type(mut self, msg_type: WsMsgType) -> Self {
        self.ws_msg_type = msg_type;
        self
    }

    /// Whether a message of `size` bytes is within `max_msg_size`.
    #[must_use]
    pub fn accepts_size(&self, size: usize) -> bool {
        self.max_msg_size.is_none_or(|max| size <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert_eq!(opts.handshake_timeout, Duration::from_millis(1000));
        assert_eq!(opts.reconnect_ivl, Duration::from_millis(100));
        assert_eq!(opts.reconnect_ivl_max, Duration::ZERO);
        assert_eq!(opts.req_resend_ivl, Duration::from_millis(60_000));
        assert_eq!(opts.surveyor_deadline, Duration::from_millis(1000));
    }

    #[test]
    fn test_builder_pattern() {
        let opts = SocketOptions::new()
            .with_reconnect_ivl(Duration::from_millis(50))
            .with_reconnect_ivl_max(Duration::from_millis(200))
            .with_tcp_nodelay(true);

        assert_eq!(opts.reconnect_ivl, Duration::from_millis(50));
        assert_eq!(opts.reconnect_ivl_max, Duration::from_millis(200));
        assert!(opts.tcp_nodelay);
    }

    #[test]
    fn test_accepts_size() {
        let unbounded = SocketOptions::new();
        assert!(unbounded.accepts_size(usize::MAX));

        let bounded = SocketOptions::new().with_max_msg_size(Some(1024));
        assert!(bounded.accepts_size(1024));
        assert!(!bounded.accepts_size(1025));
    }
}
