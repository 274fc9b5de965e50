//! Raw socket pump (the "usock" boundary).
//!
//! One actor == one established raw stream (TCP, IPC, or the TCP stream
//! underneath a WS upgrade). It owns the `AsyncRead + AsyncWrite` connection
//! and moves bytes between the kernel and the stream framer above it; it
//! never parses SP headers, frame lengths, or protocol overlays itself.
//!
//! Responsibilities:
//! - Own the socket.
//! - Drive read + write pumps (split-pump design, no shared mutable state).
//! - Emit lifecycle events (`Connected` / `ReceivedBytes` / `Disconnected`).
//! - Leave framing and protocol logic to the layers above.

use crate::alloc::{IoArena, SlabMut};

use bytes::Bytes;
use flume::{Receiver, Sender};

use compio::io::{AsyncRead, AsyncWrite};

/// Commands from the stream framer down to the raw socket.
#[derive(Debug)]
pub enum UserCmd {
    /// Send raw bytes on the wire.
    SendBytes(Bytes),
    /// Close the socket.
    Close,
}

/// Events from the raw socket up to the stream framer.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Connection established.
    Connected,
    /// Received bytes from peer.
    ReceivedBytes(Bytes),
    /// Connection closed.
    Disconnected,
}

/// Minimal protocol-agnostic socket actor. Stream framing (component C) is
/// layered on top by wrapping this actor.
pub struct SocketActor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    stream: S,

    /// Channel for sending events up to the framer.
    event_tx: Sender<SocketEvent>,

    /// Channel for receiving commands from the framer.
    cmd_rx: Receiver<UserCmd>,

    /// Allocation arena for zero-copy reads.
    arena: IoArena,
}

impl<S> SocketActor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        stream: S,
        event_tx: Sender<SocketEvent>,
        cmd_rx: Receiver<UserCmd>,
        arena: IoArena,
    ) -> Self {
        Self {
            stream,
            event_tx,
            cmd_rx,
            arena,
        }
    }

    /// Run the actor event loop (split pump design).
    ///
    /// - Read pump: kernel -> framer, via `event_tx`.
    /// - Write pump: framer -> kernel, via `cmd_rx`.
    /// - No shared mutable state between pumps.
    pub async fn run(mut self) {
        use compio::buf::BufResult;
        use compio::io::{AsyncReadExt, AsyncWriteExt};

        let _ = self.event_tx.send(SocketEvent::Connected);

        let mut write_queue: Vec<Bytes> = Vec::new();

        // Drain any queued writes (e.g. a StreamHdr greeting) before the
        // first read, so neither side blocks waiting to receive first.
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                UserCmd::SendBytes(b) => write_queue.push(b),
                UserCmd::Close => {
                    let _ = self.event_tx.send(SocketEvent::Disconnected);
                    return;
                }
            }
        }

        for buf in write_queue.drain(..) {
            let buf_vec = buf.to_vec();
            let BufResult(write_res, _) = (&mut self.stream).write_all(buf_vec).await;
            if write_res.is_err() {
                let _ = self.event_tx.send(SocketEvent::Disconnected);
                return;
            }
        }

        loop {
            while let Ok(cmd) = self.cmd_rx.try_recv() {
                match cmd {
                    UserCmd::SendBytes(b) => write_queue.push(b),
                    UserCmd::Close => {
                        let _ = self.event_tx.send(SocketEvent::Disconnected);
                        return;
                    }
                }
            }

            for buf in write_queue.drain(..) {
                tracing::trace!(len = buf.len(), "writing to network");
                let buf_vec = buf.to_vec();
                let BufResult(write_res, _) = (&mut self.stream).write_all(buf_vec).await;
                if let Err(e) = write_res {
                    tracing::debug!(error = %e, "write error, closing actor");
                    let _ = self.event_tx.send(SocketEvent::Disconnected);
                    return;
                }
            }

            let slab: SlabMut = self.arena.alloc_mut(8192);
            let BufResult(read_res, slab) = (&mut self.stream).read(slab).await;

            match read_res {
                Ok(0) => {
                    tracing::debug!("EOF, connection closed");
                    let _ = self.event_tx.send(SocketEvent::Disconnected);
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "read error");
                    let _ = self.event_tx.send(SocketEvent::Disconnected);
                    break;
                }
                Ok(n) => {
                    tracing::trace!(len = n, "read from network");
                    let bytes = slab.freeze();
                    let _ = self.event_tx.send(SocketEvent::ReceivedBytes(bytes));
                }
            }

            // Brief yield so a pending write command gets a chance between
            // reads; without it the read pump can monopolize the loop.
            compio::time::sleep(std::time::Duration::from_micros(1)).await;
        }
    }
}
