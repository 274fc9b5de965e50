//! # sp
//!
//! A nanomsg-style Scalability Protocol (SP) messaging runtime built on
//! `io_uring` (via `compio`).
//!
//! ## Architecture
//!
//! `sp` is a thin, ergonomic facade over two lower crates:
//!
//! - **`sp-core`**: endpoint addressing, wire codecs, the message type,
//!   socket options, error taxonomy, endpoint-event monitoring.
//! - **`sp-stream`**: the stream transport pipeline (framing, the StreamHdr
//!   and WebSocket handshakes), the accepted/connecting/binding endpoint
//!   tasks, and the REQ/REP/SURVEYOR/RESPONDENT protocol overlays.
//!
//! This crate wires those pieces together into `connect`/`bind` functions
//! that spawn the endpoint task as a detached `compio` job and hand back a
//! ready-to-use socket plus an endpoint-event monitor.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let rep = sp::rep_bind("tcp://127.0.0.1:0", sp::SocketOptions::default()).await?;
//! let bound_addr = rep.local_addr;
//!
//! let (mut req, _monitor) =
//!     sp::req_connect(&format!("tcp://{bound_addr}"), sp::SocketOptions::default()).await?;
//!
//! req.send(&b"ping"[..]).await?;
//! let mut peer = rep.incoming.recv_async().await?;
//! let request = peer.recv().await?;
//! peer.send(request).await?;
//! let reply = req.recv().await?;
//! assert_eq!(reply, bytes::Bytes::from_static(b"ping"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)] // Will add gradually
#![allow(clippy::doc_markdown)] // Too many false positives

use sp_core::endpoint::Endpoint;
use sp_core::error::SpError;
use sp_core::monitor::{create_monitor, SocketEvent, SocketMonitor};
use sp_core::protocol;
use sp_stream::connecting::HandshakeKind as ConnectHandshakeKind;
use sp_stream::{ChannelPipe, RepSocket, ReqSocket, RespondentSocket, SurveyorSocket};
use std::net::SocketAddr;
use std::sync::Arc;

pub use bytes::Bytes;
pub use sp_core::options::SocketOptions;

/// Development helpers (benches/tests).
pub mod dev_tracing;

fn parse(endpoint: &str) -> Result<Endpoint, SpError> {
    Endpoint::parse(endpoint).map_err(|e| SpError::protocol(e.to_string()))
}

/// Connect a REQ socket to `endpoint`, reconnecting with backoff per `opts`
/// until the socket is dropped. Returns the socket and a monitor stream of
/// connection-lifecycle events.
pub async fn req_connect(
    endpoint: &str,
    opts: SocketOptions,
) -> Result<(ReqSocket<ChannelPipe>, SocketMonitor), SpError> {
    let endpoint = parse(endpoint)?;
    let (events_tx, events_rx) = create_monitor();
    let (pipe, recv_tx, send_rx) =
        sp_stream::connecting::make_pipe(protocol::REP, vec![protocol::REP]);
    let resend_ivl = opts.req_resend_ivl;
    let opts = Arc::new(opts);

    compio::runtime::spawn(async move {
        sp_stream::connecting::run(
            endpoint,
            protocol::REQ,
            ConnectHandshakeKind::Sp,
            |p: u16| protocol::are_peers(protocol::REQ, p),
            &opts,
            events_tx,
            recv_tx,
            send_rx,
            || false,
        )
        .await;
    })
    .detach();

    Ok((ReqSocket::new(pipe, resend_ivl), events_rx))
}

/// Connect a SURVEYOR socket to `endpoint`, reconnecting with backoff per
/// `opts` until the socket is dropped.
pub async fn surveyor_connect(
    endpoint: &str,
    opts: SocketOptions,
) -> Result<(SurveyorSocket<ChannelPipe>, SocketMonitor), SpError> {
    let endpoint = parse(endpoint)?;
    let (events_tx, events_rx) = create_monitor();
    let (pipe, recv_tx, send_rx) =
        sp_stream::connecting::make_pipe(protocol::RESPONDENT, vec![protocol::RESPONDENT]);
    let deadline = opts.surveyor_deadline;
    let opts = Arc::new(opts);

    compio::runtime::spawn(async move {
        sp_stream::connecting::run(
            endpoint,
            protocol::SURVEYOR,
            ConnectHandshakeKind::Sp,
            |p: u16| protocol::are_peers(protocol::SURVEYOR, p),
            &opts,
            events_tx,
            recv_tx,
            send_rx,
            || false,
        )
        .await;
    })
    .detach();

    Ok((SurveyorSocket::new(pipe, deadline), events_rx))
}

/// A listening REP endpoint: yields one [`RepSocket`] per accepted peer.
pub struct RepListener {
    /// The address actually bound — resolved even when `endpoint` asked for
    /// an ephemeral port (`:0`).
    pub local_addr: SocketAddr,
    /// New accepted peers, one [`RepSocket`] per connection.
    pub incoming: flume::Receiver<RepSocket<ChannelPipe>>,
    /// Endpoint-lifecycle events for this listener and its accepted peers.
    pub events: SocketMonitor,
}

/// A listening RESPONDENT endpoint: yields one [`RespondentSocket`] per
/// accepted peer.
pub struct RespondentListener {
    /// The address actually bound.
    pub local_addr: SocketAddr,
    /// New accepted peers, one [`RespondentSocket`] per connection.
    pub incoming: flume::Receiver<RespondentSocket<ChannelPipe>>,
    /// Endpoint-lifecycle events for this listener and its accepted peers.
    pub events: SocketMonitor,
}

/// Bind a REP listener on `endpoint` (a TCP/IPC/WS address; `:0` picks a
/// free TCP port). Each accepted REQ peer shows up as a [`RepSocket`] on
/// `incoming`.
pub async fn rep_bind(endpoint: &str, opts: SocketOptions) -> Result<RepListener, SpError> {
    let endpoint = parse(endpoint)?;
    let (events_tx, events_rx) = create_monitor();
    let (sock_tx, sock_rx) = flume::unbounded();
    let accepted_protocols = Arc::new(vec![protocol::REQ]);
    let opts = Arc::new(opts);

    let (local_addr, events_rx) = spawn_binding(
        endpoint,
        protocol::REP,
        accepted_protocols,
        opts,
        events_tx,
        events_rx,
        move |pipe: ChannelPipe| {
            let _ = sock_tx.send(RepSocket::new(pipe));
        },
    )
    .await?;

    Ok(RepListener {
        local_addr,
        incoming: sock_rx,
        events: events_rx,
    })
}

/// Bind a RESPONDENT listener on `endpoint`. Each accepted SURVEYOR peer
/// shows up as a [`RespondentSocket`] on `incoming`.
pub async fn respondent_bind(
    endpoint: &str,
    opts: SocketOptions,
) -> Result<RespondentListener, SpError> {
    let endpoint = parse(endpoint)?;
    let (events_tx, events_rx) = create_monitor();
    let (sock_tx, sock_rx) = flume::unbounded();
    let accepted_protocols = Arc::new(vec![protocol::SURVEYOR]);
    let opts = Arc::new(opts);

    let (local_addr, events_rx) = spawn_binding(
        endpoint,
        protocol::RESPONDENT,
        accepted_protocols,
        opts,
        events_tx,
        events_rx,
        move |pipe: ChannelPipe| {
            let _ = sock_tx.send(RespondentSocket::new(pipe));
        },
    )
    .await?;

    Ok(RespondentListener {
        local_addr,
        incoming: sock_rx,
        events: events_rx,
    })
}

/// Spawn `sp_stream::binding`'s accept loop as a detached task, then wait
/// for its first `Bound` event so the caller learns the real listening
/// address even when it asked to bind `:0`. Returns the now-partially-drained
/// monitor receiver for the caller to keep watching.
async fn spawn_binding(
    endpoint: Endpoint,
    local_protocol: u16,
    accepted_protocols: Arc<Vec<u16>>,
    opts: Arc<SocketOptions>,
    events_tx: sp_core::monitor::SocketEventSender,
    events_rx: SocketMonitor,
    on_accept: impl Fn(ChannelPipe) + Send + Sync + 'static,
) -> Result<(SocketAddr, SocketMonitor), SpError> {
    let is_ws = endpoint.is_ws();
    compio::runtime::spawn(async move {
        let result = if is_ws {
            sp_stream::binding::run_ws(
                endpoint,
                local_protocol,
                accepted_protocols,
                opts,
                events_tx,
                on_accept,
            )
            .await
        } else {
            sp_stream::binding::run_tcp(
                endpoint,
                local_protocol,
                accepted_protocols,
                opts,
                events_tx,
                on_accept,
            )
            .await
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "listener stopped");
        }
    })
    .detach();

    loop {
        match events_rx
            .recv_async()
            .await
            .map_err(|_| SpError::transient("listener task ended before binding"))?
        {
            SocketEvent::Bound(Endpoint::Tcp(addr) | Endpoint::Ws(addr)) => {
                return Ok((addr, events_rx))
            }
            SocketEvent::BindFailed { reason, .. } => {
                return Err(SpError::transient(reason));
            }
            _ => {}
        }
    }
}

