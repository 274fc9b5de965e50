//! Binding-side endpoint (component F: `btcp`/`bipc`/`bws`).
//!
//! Listens on one endpoint; for each accepted connection, spawns an
//! accepted-side task (component D) and hands its pipe to `on_accept`.
//! Upstream's `IDLE -> ACTIVE -> STOPPING_A -> STOPPING_USOCK ->
//! STOPPING_AS` shutdown order — the in-flight "currently accepting" slot
//! stops first, then the listening usock, then every surviving child `A*`
//! in parallel — maps onto dropping the accept loop, then the listener,
//! then joining the still-running per-connection tasks.

use crate::accepted;
use crate::pipebase::ChannelPipe;
use sp_core::endpoint::Endpoint;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::monitor::{SocketEvent, SocketEventSender};
use sp_core::options::SocketOptions;
use std::sync::Arc;

/// Which opening handshake accepted connections on this listener run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Sp,
    Ws,
}

/// Run the accept loop on `endpoint` until the listener is dropped or a
/// fatal accept error occurs. For each accepted connection, builds a
/// [`ChannelPipe`] and calls `on_accept` with it before spawning the
/// per-connection active loop as a detached `compio` task — mirroring the
/// "in-flight `A*` machines are unordered, and the listener doesn't wait on
/// them individually" shutdown model: dropping this future (and the
/// listener it owns) is `STOPPING_USOCK`; the spawned children keep
/// running independently until their own link breaks, which is
/// `STOPPING_AS` collapsed into ordinary task teardown.
pub async fn run_tcp(
    endpoint: Endpoint,
    local_protocol: u16,
    accepted_protocols: Arc<Vec<u16>>,
    opts: Arc<SocketOptions>,
    events: SocketEventSender,
    on_accept: impl Fn(ChannelPipe) + Send + Sync + 'static,
) -> Result<(), SpError> {
    let Endpoint::Tcp(addr) = &endpoint else {
        return Err(SpError::protocol("run_tcp requires a Tcp endpoint"));
    };
    let listener = compio::net::TcpListener::bind(*addr).await.map_err(|e| {
        let _ = events.send(SocketEvent::BindFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        });
        SpError::Io(e)
    })?;
    // `addr`'s port may be 0 (pick any free port); report the address the OS
    // actually bound so a caller that asked for `:0` can learn the real one.
    let bound = Endpoint::Tcp(listener.local_addr().map_err(SpError::Io)?);
    let _ = events.send(SocketEvent::Bound(bound.clone()));
    let _ = events.send(SocketEvent::Listening(bound));

    let on_accept = Arc::new(on_accept);

    loop {
        let (stream, peer_addr) = listener.accept().await.map_err(SpError::Io)?;
        if opts.tcp_nodelay {
            let _ = sp_core::tcp::enable_tcp_nodelay(&stream);
        }
        let peer_endpoint = Endpoint::Tcp(peer_addr);
        let _ = events.send(SocketEvent::Accepted(peer_endpoint.clone()));

        spawn_accepted(
            stream,
            local_protocol,
            accepted_protocols.clone(),
            opts.clone(),
            events.clone(),
            peer_endpoint,
            on_accept.clone(),
            HandshakeKind::Sp,
        );
    }
}

/// WebSocket variant of [`run_tcp`]: identical accept loop, but each
/// accepted connection runs the HTTP Upgrade handshake instead of the SP
/// header exchange.
pub async fn run_ws(
    endpoint: Endpoint,
    local_protocol: u16,
    accepted_protocols: Arc<Vec<u16>>,
    opts: Arc<SocketOptions>,
    events: SocketEventSender,
    on_accept: impl Fn(ChannelPipe) + Send + Sync + 'static,
) -> Result<(), SpError> {
    let Endpoint::Ws(addr) = &endpoint else {
        return Err(SpError::protocol("run_ws requires a Ws endpoint"));
    };
    let listener = compio::net::TcpListener::bind(*addr).await.map_err(|e| {
        let _ = events.send(SocketEvent::BindFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        });
        SpError::Io(e)
    })?;
    let bound = Endpoint::Ws(listener.local_addr().map_err(SpError::Io)?);
    let _ = events.send(SocketEvent::Bound(bound.clone()));
    let _ = events.send(SocketEvent::Listening(bound));

    let on_accept = Arc::new(on_accept);

    loop {
        let (stream, peer_addr) = listener.accept().await.map_err(SpError::Io)?;
        let peer_endpoint = Endpoint::Ws(peer_addr);
        let _ = events.send(SocketEvent::Accepted(peer_endpoint.clone()));

        spawn_accepted(
            stream,
            local_protocol,
            accepted_protocols.clone(),
            opts.clone(),
            events.clone(),
            peer_endpoint,
            on_accept.clone(),
            HandshakeKind::Ws,
        );
    }
}

#[cfg(unix)]
/// IPC variant of [`run_tcp`] over a Unix domain socket listener.
pub async fn run_ipc(
    endpoint: Endpoint,
    local_protocol: u16,
    accepted_protocols: Arc<Vec<u16>>,
    opts: Arc<SocketOptions>,
    events: SocketEventSender,
    on_accept: impl Fn(ChannelPipe) + Send + Sync + 'static,
) -> Result<(), SpError> {
    let Endpoint::Ipc(path) = &endpoint else {
        return Err(SpError::protocol("run_ipc requires an Ipc endpoint"));
    };
    let listener = sp_core::ipc::bind(path).await.map_err(|e| {
        let _ = events.send(SocketEvent::BindFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        });
        SpError::Io(e)
    })?;
    let _ = events.send(SocketEvent::Bound(endpoint.clone()));
    let _ = events.send(SocketEvent::Listening(endpoint.clone()));

    let on_accept = Arc::new(on_accept);

    loop {
        let stream = sp_core::ipc::accept(&listener).await.map_err(SpError::Io)?;
        let peer_endpoint = endpoint.clone();
        let _ = events.send(SocketEvent::Accepted(peer_endpoint.clone()));

        spawn_accepted(
            stream,
            local_protocol,
            accepted_protocols.clone(),
            opts.clone(),
            events.clone(),
            peer_endpoint,
            on_accept.clone(),
            HandshakeKind::Sp,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_accepted<S>(
    stream: S,
    local_protocol: u16,
    accepted_protocols: Arc<Vec<u16>>,
    opts: Arc<SocketOptions>,
    events: SocketEventSender,
    peer_endpoint: Endpoint,
    on_accept: Arc<impl Fn(ChannelPipe) + Send + Sync + 'static>,
    handshake: HandshakeKind,
) where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin + 'static,
{
    let (send_tx, send_rx) = flume::unbounded::<Message>();
    let (recv_tx, recv_rx) = flume::unbounded::<Message>();

    // The peer's protocol id is only known once the handshake completes, but
    // the pipe is handed to the overlay eagerly so it can start polling recv;
    // a listener only ever accepts protocols in `accepted_protocols`, so the
    // first entry stands in until overlays need per-pipe negotiated values.
    let peer_protocol_hint = accepted_protocols.first().copied().unwrap_or(local_protocol);
    let pipe = ChannelPipe::new(
        send_tx,
        recv_rx,
        peer_protocol_hint,
        (*accepted_protocols).clone(),
    );
    on_accept(pipe);

    compio::runtime::spawn(async move {
        let accepts = move |p: u16| sp_core::protocol::are_peers(local_protocol, p);

        let result = match handshake {
            HandshakeKind::Sp => {
                accepted::run(
                    stream,
                    local_protocol,
                    accepts,
                    &opts,
                    events.clone(),
                    peer_endpoint.clone(),
                    recv_tx,
                    send_rx,
                )
                .await
            }
            HandshakeKind::Ws => {
                accepted::run_ws(
                    stream,
                    local_protocol,
                    accepts,
                    &opts,
                    events.clone(),
                    peer_endpoint.clone(),
                    recv_tx,
                    send_rx,
                )
                .await
            }
        };

        if let Err(e) = result {
            tracing::debug!(endpoint = %peer_endpoint, error = %e, "accepted connection ended");
        }
    })
    .detach();
}
