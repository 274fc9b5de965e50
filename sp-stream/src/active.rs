//! The active-link pump shared by the accepted side (component D) and the
//! connecting side (component E): `stcp.c`'s `NN_STCP_STATE_ACTIVE` handling
//! is identical regardless of which side established the connection, so
//! upstream shares one `nn_stcp` instance between `nn_atcp`/`nn_ctcp`. This
//! module is that shared piece, expressed as one async loop instead of an
//! FSM instance embedded in both callers.
//!
//! TCP and IPC share the same length-prefixed framer (`framing.rs`), differing
//! only in the leading message-type byte IPC's `sipc.c` adds; WS instead
//! switches to RFC 6455 data frames once the opening handshake is done, so it
//! gets its own message-oriented loop rather than reusing the byte-stream one.

use crate::framing::{encode, FrameDecoder, FramingKind};
use crate::ws::frame::{self, Role};
use sp_core::alloc::IoArena;
use sp_core::endpoint::Endpoint;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::monitor::{SocketEvent, SocketEventSender};
use sp_core::options::SocketOptions;

/// Pump a single established connection until it closes or errors: write
/// messages pulled from `send_rx`, decode frames from the wire into
/// `recv_tx`. Returns `Ok(())` on a clean local or peer close, `Err` on an
/// I/O or framing failure (the caller decides whether that is terminal or
/// should trigger a reconnect). `role` only matters for [`Endpoint::Ws`]:
/// it selects which side masks its outgoing frames.
pub async fn pump<S>(
    stream: S,
    opts: &SocketOptions,
    events: &SocketEventSender,
    endpoint: &Endpoint,
    recv_tx: &flume::Sender<Message>,
    send_rx: &flume::Receiver<Message>,
    role: Role,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    match endpoint {
        Endpoint::Ws(_) => pump_ws(stream, opts, events, endpoint, recv_tx, send_rx, role).await,
        #[cfg(unix)]
        Endpoint::Ipc(_) => {
            pump_stream(stream, opts, events, endpoint, recv_tx, send_rx, FramingKind::Ipc).await
        }
        Endpoint::Tcp(_) => {
            pump_stream(stream, opts, events, endpoint, recv_tx, send_rx, FramingKind::Stream).await
        }
    }
}

async fn pump_stream<S>(
    mut stream: S,
    opts: &SocketOptions,
    events: &SocketEventSender,
    endpoint: &Endpoint,
    recv_tx: &flume::Sender<Message>,
    send_rx: &flume::Receiver<Message>,
    framing: FramingKind,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    use compio::buf::BufResult;
    use compio::io::{AsyncReadExt, AsyncWriteExt};
    use futures::{select, FutureExt};

    let mut decoder = FrameDecoder::new(opts.max_msg_size, framing);
    let mut arena = IoArena::new();

    loop {
        enum Step {
            Outgoing(Message),
            SendChannelClosed,
            Incoming(std::io::Result<usize>, sp_core::alloc::SlabMut),
        }

        let read_size = opts.recv_buffer_size.min(sp_core::alloc::PAGE_SIZE);
        let slab = arena.alloc_mut(read_size);

        let step = select! {
            msg = send_rx.recv_async().fuse() => {
                match msg {
                    Ok(m) => Step::Outgoing(m),
                    Err(_) => Step::SendChannelClosed,
                }
            }
            res = (&mut stream).read(slab).fuse() => {
                let BufResult(r, s) = res;
                Step::Incoming(r, s)
            }
        };

        match step {
            Step::Outgoing(msg) => {
                let wire = encode(&msg, framing);
                let BufResult(res, _) = stream.write_all(wire.to_vec()).await;
                res.map_err(SpError::Io)?;
            }
            Step::SendChannelClosed => {
                let _ = events.send(SocketEvent::Dropped(endpoint.clone()));
                return Ok(());
            }
            Step::Incoming(Ok(0), _) => {
                let _ = events.send(SocketEvent::Dropped(endpoint.clone()));
                return Ok(());
            }
            Step::Incoming(Ok(_n), slab) => {
                decoder.push(slab.freeze());
                while let Some(msg) = decoder.try_decode()? {
                    if recv_tx.send_async(msg).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Step::Incoming(Err(e), _) => {
                let _ = events.send(SocketEvent::Broken {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                return Err(SpError::Io(e));
            }
        }
    }
}

async fn pump_ws<S>(
    mut stream: S,
    opts: &SocketOptions,
    events: &SocketEventSender,
    endpoint: &Endpoint,
    recv_tx: &flume::Sender<Message>,
    send_rx: &flume::Receiver<Message>,
    role: Role,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    use compio::io::AsyncWriteExt;
    use futures::{select, FutureExt};

    loop {
        enum Step {
            Outgoing(Message),
            SendChannelClosed,
            Incoming(Result<Message, SpError>),
        }

        let step = select! {
            msg = send_rx.recv_async().fuse() => {
                match msg {
                    Ok(m) => Step::Outgoing(m),
                    Err(_) => Step::SendChannelClosed,
                }
            }
            res = frame::read_message(&mut stream, opts.max_msg_size, role).fuse() => {
                Step::Incoming(res)
            }
        };

        match step {
            Step::Outgoing(msg) => {
                let wire = frame::encode_message(&msg, opts.ws_msg_type, role);
                let compio::buf::BufResult(res, _) = stream.write_all(wire.to_vec()).await;
                res.map_err(SpError::Io)?;
            }
            Step::SendChannelClosed => {
                let _ = events.send(SocketEvent::Dropped(endpoint.clone()));
                return Ok(());
            }
            Step::Incoming(Ok(msg)) => {
                if recv_tx.send_async(msg).await.is_err() {
                    return Ok(());
                }
            }
            Step::Incoming(Err(e)) if matches!(e, SpError::PeerGone(_)) => {
                let _ = events.send(SocketEvent::Dropped(endpoint.clone()));
                return Err(e);
            }
            Step::Incoming(Err(e)) => {
                let _ = events.send(SocketEvent::Broken {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        }
    }
}
