//! StreamHdr: the SP protocol-header handshake (component G).
//!
//! Upstream runs this as a callback FSM with states
//! `IDLE -> SENDING -> RECEIVING -> STOPPING_TIMER_{ERROR,DONE} -> DONE`,
//! racing a 1000ms timer against the raw socket's send/receive completions.
//! Every FSM in this crate is instead a `compio` task, so the send-then-race
//! collapses into one async function: send the 8-byte header, then race
//! `read_exact` against `Timer::wait` inside a `select!` — exactly the
//! cancel-safety `Timer` documents. There is no separate `STOPPING_TIMER_*`
//! bookkeeping because dropping the losing branch of `select!` is the
//! timer-stop.

use bytes::BytesMut;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use futures::{select, FutureExt};
use sp_core::error::SpError;
use sp_core::timer::Timer;

/// The fixed 8-byte SP protocol header template: `\0SP\0` magic, a
/// big-endian `u16` protocol id at offset 4, two reserved zero bytes.
const PROTOHDR_TEMPLATE: [u8; 8] = *b"\0SP\0\0\0\0\0";

/// Compose the outgoing protocol header for `protocol`.
#[must_use]
pub fn compose_protohdr(protocol: u16) -> [u8; 8] {
    let mut hdr = PROTOHDR_TEMPLATE;
    sp_core::wire::put_u16(&mut hdr[4..6], protocol);
    hdr
}

/// Parse a received protocol header, checking the `\0SP\0` magic and
/// returning the peer's advertised protocol id.
///
/// Mirrors `memcmp(protohdr, "\0SP\0", 4)` followed by `nn_gets(protohdr+4)`.
pub fn parse_protohdr(hdr: &[u8; 8]) -> Result<u16, SpError> {
    if hdr[..4] != PROTOHDR_TEMPLATE[..4] {
        return Err(SpError::protocol("bad SP magic in protocol header"));
    }
    Ok(sp_core::wire::get_u16(&hdr[4..6]))
}

/// Run the StreamHdr handshake on an already-connected raw stream: send our
/// protocol header, then wait up to `timeout` for the peer's, checking it
/// advertises a protocol this pipe accepts.
///
/// `accepts` mirrors `nn_pipebase_ispeer`: given the peer's protocol id,
/// decide whether this pipe is willing to talk to it.
pub async fn exchange<S>(
    stream: &mut S,
    local_protocol: u16,
    timeout: std::time::Duration,
    accepts: impl Fn(u16) -> bool,
) -> Result<(), SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    use compio::buf::BufResult;

    let outgoing = compose_protohdr(local_protocol);
    let BufResult(send_res, _) = stream.write_all(outgoing.to_vec()).await;
    send_res.map_err(SpError::Io)?;

    let timer = Timer::new(timeout);
    let buf = BytesMut::zeroed(8);

    select! {
        recv = stream.read_exact(buf).fuse() => {
            let BufResult(res, got) = recv;
            res.map_err(SpError::Io)?;
            let mut hdr = [0u8; 8];
            hdr.copy_from_slice(&got[..8]);
            let peer_protocol = parse_protohdr(&hdr)?;
            if !accepts(peer_protocol) {
                return Err(SpError::protocol(format!(
                    "peer advertised incompatible protocol {peer_protocol}"
                )));
            }
            Ok(())
        }
        () = timer.wait().fuse() => {
            Err(SpError::transient("StreamHdr handshake timed out"))
        }
    }
}

/// The WebSocket variant of component G: an RFC 6455 opening handshake in
/// place of the raw 8-byte header exchange. Delegated to [`crate::ws`]; kept
/// here only as the entry point StreamHdr's caller uses regardless of which
/// variant a bound/connected endpoint negotiates.
pub use crate::ws::handshake::{client_handshake as ws_client_handshake, server_handshake as ws_server_handshake};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_protohdr_has_sp_magic_and_protocol_id() {
        let hdr = compose_protohdr(7);
        assert_eq!(&hdr[..4], b"\0SP\0");
        assert_eq!(&hdr[6..], &[0, 0]);
        assert_eq!(sp_core::wire::get_u16(&hdr[4..6]), 7);
    }

    #[test]
    fn parse_protohdr_rejects_bad_magic() {
        let hdr = *b"GARBAGE!";
        assert!(parse_protohdr(&hdr).is_err());
    }

    #[test]
    fn parse_protohdr_round_trips() {
        let hdr = compose_protohdr(42);
        assert_eq!(parse_protohdr(&hdr).unwrap(), 42);
    }
}
