//! Pipebase: the abstraction protocol overlays use to read and write framed
//! messages, independent of which transport (TCP/IPC/WS) or which side
//! (accepted/connecting) produced the pipe.
//!
//! Upstream's `nn_pipebase` is a vtable the transport fills in; the
//! equivalent here is a trait plus a concrete channel-backed implementation
//! over a running [`crate::accepted::AcceptedPipe`]/[`crate::connecting::ConnectingPipe`].
//! Invariant: at most one outstanding `send` and one outstanding `recv` per
//! pipe, enforced by `&mut self` on both.

use async_trait::async_trait;
use sp_core::error::SpError;
use sp_core::message::Message;

/// Protocol-facing view of an established link.
#[async_trait]
pub trait Pipebase: Send {
    /// Send one message. Resolves once the framer has accepted it for
    /// writing (not necessarily once the bytes hit the wire).
    async fn send(&mut self, msg: Message) -> Result<(), SpError>;

    /// Receive one message.
    async fn recv(&mut self) -> Result<Message, SpError>;

    /// The peer's protocol id, known once the handshake (component G)
    /// completed.
    fn peer_protocol(&self) -> u16;

    /// Whether this pipe accepts a peer advertising `protocol` — the
    /// compatibility check StreamHdr runs against during the handshake.
    fn is_peer(&self, protocol: u16) -> bool;
}

/// Flume-channel pipe: the framer (component C) on one end, a protocol
/// overlay on the other. Used by both the accepted-side and connecting-side
/// endpoint once their handshake has completed.
pub struct ChannelPipe {
    send_tx: flume::Sender<Message>,
    recv_rx: flume::Receiver<Message>,
    peer_protocol: u16,
    accepted_protocols: Vec<u16>,
}

impl ChannelPipe {
    #[must_use]
    pub fn new(
        send_tx: flume::Sender<Message>,
        recv_rx: flume::Receiver<Message>,
        peer_protocol: u16,
        accepted_protocols: Vec<u16>,
    ) -> Self {
        Self {
            send_tx,
            recv_rx,
            peer_protocol,
            accepted_protocols,
        }
    }
}

#[async_trait]
impl Pipebase for ChannelPipe {
    async fn send(&mut self, msg: Message) -> Result<(), SpError> {
        self.send_tx
            .send_async(msg)
            .await
            .map_err(|_| SpError::ChannelClosed)
    }

    async fn recv(&mut self) -> Result<Message, SpError> {
        self.recv_rx
            .recv_async()
            .await
            .map_err(|_| SpError::ChannelClosed)
    }

    fn peer_protocol(&self) -> u16 {
        self.peer_protocol
    }

    fn is_peer(&self, protocol: u16) -> bool {
        self.accepted_protocols.contains(&protocol)
    }
}
