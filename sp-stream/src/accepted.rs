//! Accepted-side endpoint (component D: `atcp`/`aipc`/`aws`).
//!
//! Owns one accepted raw socket end to end: run StreamHdr, then pump the
//! framer until the link breaks. Upstream models this as `IDLE ->
//! ACCEPTING -> ACTIVE -> STOPPING_STREAM -> STOPPING_USOCK -> DONE`; as an
//! async task that collapses to "run the handshake, then hand off to the
//! shared active-link pump until it returns".

use crate::active;
use crate::pipebase::ChannelPipe;
use crate::streamhdr;
use crate::ws::frame::Role;
use sp_core::endpoint::Endpoint;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::monitor::{SocketEvent, SocketEventSender};
use sp_core::options::SocketOptions;

/// Run one accepted connection to completion: handshake, then the active
/// framer loop. Returns when the link closes or is asked to stop.
pub async fn run<S>(
    mut stream: S,
    local_protocol: u16,
    accepts: impl Fn(u16) -> bool + Send,
    opts: &SocketOptions,
    events: SocketEventSender,
    endpoint: Endpoint,
    recv_tx: flume::Sender<Message>,
    send_rx: flume::Receiver<Message>,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    streamhdr::exchange(&mut stream, local_protocol, opts.handshake_timeout, &accepts)
        .await
        .map_err(|e| {
            let _ = events.send(SocketEvent::Broken {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });
            e
        })?;

    let _ = events.send(SocketEvent::Established(endpoint.clone()));

    active::pump(
        stream, opts, &events, &endpoint, &recv_tx, &send_rx, Role::Server,
    )
    .await
}

/// `aws` variant: the peer opens with an HTTP Upgrade request instead of an
/// 8-byte SP header, so the handshake step is [`crate::ws::handshake::server_handshake`]
/// rather than [`streamhdr::exchange`] — compatibility is checked by the
/// handshake itself, before it ever replies `101`, so there is no separate
/// post-handshake check here. The active loop switches to RFC 6455 data
/// framing once the handshake is done.
pub async fn run_ws<S>(
    mut stream: S,
    local_protocol: u16,
    accepts: impl Fn(u16) -> bool + Send,
    opts: &SocketOptions,
    events: SocketEventSender,
    endpoint: Endpoint,
    recv_tx: flume::Sender<Message>,
    send_rx: flume::Receiver<Message>,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    crate::ws::handshake::server_handshake(&mut stream, local_protocol, accepts)
        .await
        .map_err(|e| {
            let _ = events.send(SocketEvent::Broken {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });
            e
        })?;

    let _ = events.send(SocketEvent::Established(endpoint.clone()));

    active::pump(
        stream, opts, &events, &endpoint, &recv_tx, &send_rx, Role::Server,
    )
    .await
}

/// Construct the [`ChannelPipe`] a protocol overlay will talk to once
/// `run` above is spawned, wiring it to the same channel pair.
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
