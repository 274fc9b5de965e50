//! Connecting-side endpoint (component E: `ctcp`/`cipc`/`cws`).
//!
//! Upstream's `ctcp.c` chains `IDLE -> RESOLVING -> CONNECTING -> ACTIVE ->
//! STOPPING_STCP -> STOPPING_USOCK -> WAITING -> STOPPING_BACKOFF` and loops
//! back to `CONNECTING` after the backoff timer fires. `Endpoint` here is
//! always already resolved (address parsing/DNS is the embedder's concern,
//! per [`sp_core::endpoint`]), so `RESOLVING`/`STOPPING_DNS` collapse away;
//! the remaining chain is "connect, run the handshake, pump the active
//! link, and on any failure back off before retrying" — one loop, racing
//! nothing but its own backoff timer between attempts.

use crate::active;
use crate::pipebase::ChannelPipe;
use crate::streamhdr;
use crate::ws::frame::Role;
use sp_core::endpoint::Endpoint;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::monitor::{SocketEvent, SocketEventSender};
use sp_core::options::SocketOptions;
use sp_core::timer::Backoff;

/// What kind of handshake to run once the raw transport connects. `sws`
/// trades the SP header exchange for an HTTP Upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Sp,
    Ws,
}

/// Dial `endpoint` repeatedly until `recv_tx`'s peer (the protocol overlay)
/// drops its end of `send_rx`, signalling a local close. Each attempt:
/// connect -> handshake -> active pump; any failure at any stage reports
/// `ConnectError`/`Broken` and restarts after `backoff`, mirroring upstream
/// `ctcp.c`'s "drop the stcp/usock, then wait" shutdown-into-retry path. A
/// clean peer-initiated close after a successful handshake also retries —
/// `peer_gone` lets callers (e.g. a WS client that saw a clean WS close
/// frame) suppress that and let the connection stay down instead.
pub async fn run(
    endpoint: Endpoint,
    local_protocol: u16,
    handshake: HandshakeKind,
    accepts: impl Fn(u16) -> bool + Send + Clone,
    opts: &SocketOptions,
    events: SocketEventSender,
    recv_tx: flume::Sender<Message>,
    send_rx: flume::Receiver<Message>,
    peer_gone: impl Fn() -> bool + Send,
) {
    let mut backoff = Backoff::new(opts.reconnect_ivl, opts.reconnect_ivl_max);

    loop {
        if send_rx.is_disconnected() {
            return;
        }

        let _ = events.send(SocketEvent::InProgress(endpoint.clone()));

        match dial_once(
            &endpoint,
            local_protocol,
            handshake,
            accepts.clone(),
            opts,
            &events,
            &recv_tx,
            &send_rx,
        )
        .await
        {
            Ok(()) => {
                if peer_gone() {
                    return;
                }
                backoff.reset();
            }
            Err(_) => {}
        }

        if send_rx.is_disconnected() {
            return;
        }

        let delay = backoff.next();
        if delay.is_zero() {
            continue;
        }
        sp_core::timer::Timer::new(delay).wait().await;
    }
}

async fn dial_once(
    endpoint: &Endpoint,
    local_protocol: u16,
    handshake: HandshakeKind,
    accepts: impl Fn(u16) -> bool + Send,
    opts: &SocketOptions,
    events: &SocketEventSender,
    recv_tx: &flume::Sender<Message>,
    send_rx: &flume::Receiver<Message>,
) -> Result<(), SpError> {
    match endpoint {
        Endpoint::Tcp(addr) | Endpoint::Ws(addr) => {
            let stream = compio::net::TcpStream::connect(*addr).await.map_err(|e| {
                let _ = events.send(SocketEvent::ConnectError {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                SpError::Io(e)
            })?;
            if opts.tcp_nodelay {
                let _ = sp_core::tcp::enable_tcp_nodelay(&stream);
            }
            run_over_stream(
                stream,
                endpoint,
                local_protocol,
                handshake,
                accepts,
                opts,
                events,
                recv_tx,
                send_rx,
            )
            .await
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => {
            let stream = sp_core::ipc::connect(path).await.map_err(|e| {
                let _ = events.send(SocketEvent::ConnectError {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                SpError::Io(e)
            })?;
            run_over_stream(
                stream,
                endpoint,
                local_protocol,
                handshake,
                accepts,
                opts,
                events,
                recv_tx,
                send_rx,
            )
            .await
        }
    }
}

async fn run_over_stream<S>(
    mut stream: S,
    endpoint: &Endpoint,
    local_protocol: u16,
    handshake: HandshakeKind,
    accepts: impl Fn(u16) -> bool + Send,
    opts: &SocketOptions,
    events: &SocketEventSender,
    recv_tx: &flume::Sender<Message>,
    send_rx: &flume::Receiver<Message>,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    match handshake {
        HandshakeKind::Sp => {
            streamhdr::exchange(&mut stream, local_protocol, opts.handshake_timeout, &accepts)
                .await
                .map_err(|e| {
                    let _ = events.send(SocketEvent::Broken {
                        endpoint: endpoint.clone(),
                        reason: e.to_string(),
                    });
                    e
                })?;
        }
        HandshakeKind::Ws => {
            let host = endpoint.to_string();
            let peer_protocol = crate::ws::handshake::client_handshake(
                &mut stream,
                &host,
                local_protocol,
            )
            .await
            .map_err(|e| {
                let _ = events.send(SocketEvent::Broken {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                e
            })?;
            if !accepts(peer_protocol) {
                let e = SpError::protocol(format!(
                    "peer advertised incompatible protocol {peer_protocol}"
                ));
                let _ = events.send(SocketEvent::Broken {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    let _ = events.send(SocketEvent::Established(endpoint.clone()));
    active::pump(
        stream, opts, events, endpoint, recv_tx, send_rx, Role::Client,
    )
    .await
}

/// Construct the [`ChannelPipe`] a protocol overlay will talk to; the same
/// channel pair is handed to [`run`] above.
#[must_use]
pub fn make_pipe(
    peer_protocol: u16,
    accepted_protocols: Vec<u16>,
) -> (
    ChannelPipe,
    flume::Sender<Message>,
    flume::Receiver<Message>,
) {
    let (send_tx, send_rx) = flume::unbounded();
    let (recv_tx, recv_rx) = flume::unbounded();
    (
        ChannelPipe::new(send_tx, recv_rx, peer_protocol, accepted_protocols),
        recv_tx,
        send_rx,
    )
}
