//! Stream framer (component C): the length-prefixed encoding shared by the
//! TCP and IPC stream transports. `stcp.c` frames `u64be(length) ++
//! payload`; `sipc.c` frames the same length prefix but with a leading
//! `u8` message-type byte (`NN_SIPC_MSG_NORMAL = 1`) ahead of it — the two
//! transports otherwise drive the same `INSTATE_{HDR,BODY,HASMSG}` states.
//!
//! This is sans-IO: [`FrameDecoder`] only consumes bytes handed to it and
//! yields complete [`Message`]s, so it is testable without a socket. The
//! length-prefixed payload carries `sphdr ++ body` back to back — the
//! framer does not know where one ends and the other begins; protocol
//! overlays (REQ, SURVEYOR) are the ones that split a fixed-size `sphdr`
//! prefix back off after decode.

use bytes::{Bytes, BytesMut};
use sp_core::buffer::SegmentedBuffer;
use sp_core::error::SpError;
use sp_core::message::Message;

/// `NN_SIPC_MSG_NORMAL`: the only message type this crate emits or accepts
/// on an IPC connection. `sipc.c` reserves other values for its own
/// keepalive/ancillary-data traffic, which this crate does not implement.
const SIPC_MSG_NORMAL: u8 = 1;

/// Which leading-byte convention a connection's stream framing uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    /// TCP and WS-over-bytes: `u64be(len) ++ payload`, no type byte.
    Stream,
    /// IPC: `u8 msg_type ++ u64be(len) ++ payload`.
    Ipc,
}

enum InState {
    /// IPC only: waiting for the leading message-type byte.
    MsgType,
    /// Waiting for the 8-byte length prefix.
    Hdr,
    /// Waiting for `len` bytes of payload.
    Body { len: u64 },
}

/// Decodes a byte stream into complete messages. One decoder per connection.
pub struct FrameDecoder {
    buf: SegmentedBuffer,
    state: InState,
    max_msg_size: Option<usize>,
    framing: FramingKind,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(max_msg_size: Option<usize>, framing: FramingKind) -> Self {
        Self {
            buf: SegmentedBuffer::new(),
            state: match framing {
                FramingKind::Stream => InState::Hdr,
                FramingKind::Ipc => InState::MsgType,
            },
            max_msg_size,
            framing,
        }
    }

    /// Feed newly-received bytes into the decoder.
    pub fn push(&mut self, bytes: Bytes) {
        self.buf.push(bytes);
    }

    /// Try to decode one complete message from buffered bytes.
    ///
    /// Returns `Ok(None)` if more bytes are needed. Returns `Err` if the
    /// announced length violates `max_msg_size` — the caller should treat
    /// this as `NN_STCP_ERROR`/`PolicyExceeded` and tear the connection down,
    /// mirroring `stcp.c`'s `RCVMAXSIZE` check — or if an IPC message-type
    /// byte names anything other than `NN_SIPC_MSG_NORMAL`.
    pub fn try_decode(&mut self) -> Result<Option<Message>, SpError> {
        loop {
            match self.state {
                InState::MsgType => {
                    if self.buf.len() < 1 {
                        return Ok(None);
                    }
                    let mut byte = [0u8; 1];
                    self.buf.copy_prefix(1, &mut byte);
                    self.buf.advance(1);
                    if byte[0] != SIPC_MSG_NORMAL {
                        return Err(SpError::protocol(format!(
                            "unsupported IPC message type {}",
                            byte[0]
                        )));
                    }
                    self.state = InState::Hdr;
                }
                InState::Hdr => {
                    if self.buf.len() < 8 {
                        return Ok(None);
                    }
                    let mut hdr = [0u8; 8];
                    self.buf.copy_prefix(8, &mut hdr);
                    self.buf.advance(8);
                    let len = sp_core::wire::get_u64(&hdr);
                    if let Some(max) = self.max_msg_size {
                        if len > max as u64 {
                            return Err(SpError::policy_exceeded(len as usize, max));
                        }
                    }
                    self.state = InState::Body { len };
                }
                InState::Body { len } => {
                    let len = len as usize;
                    if self.buf.len() < len {
                        return Ok(None);
                    }
                    let payload = self
                        .buf
                        .take_bytes(len)
                        .expect("length check ensures bytes are available");
                    self.state = match self.framing {
                        FramingKind::Stream => InState::Hdr,
                        FramingKind::Ipc => InState::MsgType,
                    };
                    return Ok(Some(Message::from_body(payload)));
                }
            }
        }
    }
}

/// Encode a message as `[u8 msg_type ++] u64be(len) ++ sphdr ++ body` ready
/// to hand to the raw socket pump. The leading type byte is only present
/// for [`FramingKind::Ipc`].
#[must_use]
pub fn encode(msg: &Message, framing: FramingKind) -> Bytes {
    let len = msg.wire_len() as u64;
    let prefix_len = match framing {
        FramingKind::Stream => 8,
        FramingKind::Ipc => 9,
    };
    let mut out = BytesMut::with_capacity(prefix_len + len as usize);
    if framing == FramingKind::Ipc {
        out.extend_from_slice(&[SIPC_MSG_NORMAL]);
    }
    let hdr_start = out.len();
    out.resize(hdr_start + 8, 0);
    sp_core::wire::put_u64(&mut out[hdr_start..hdr_start + 8], len);
    out.extend_from_slice(msg.sphdr());
    out.extend_from_slice(msg.body());
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_message_split_across_pushes() {
        let msg = Message::from_body(&b"hello"[..]);
        let wire = encode(&msg, FramingKind::Stream);

        let mut decoder = FrameDecoder::new(None, FramingKind::Stream);
        decoder.push(wire.slice(0..3));
        assert!(decoder.try_decode().unwrap().is_none());
        decoder.push(wire.slice(3..));
        let decoded = decoder.try_decode().unwrap().unwrap();
        assert_eq!(decoded.body(), &Bytes::from_static(b"hello"));
    }

    #[test]
    fn decodes_zero_length_body() {
        let msg = Message::from_body(Bytes::new());
        let wire = encode(&msg, FramingKind::Stream);
        let mut decoder = FrameDecoder::new(None, FramingKind::Stream);
        decoder.push(wire);
        let decoded = decoder.try_decode().unwrap().unwrap();
        assert!(decoded.body().is_empty());
    }

    #[test]
    fn rejects_oversized_announced_length() {
        let mut hdr = [0u8; 8];
        sp_core::wire::put_u64(&mut hdr, 1_000_000);
        let mut decoder = FrameDecoder::new(Some(1024), FramingKind::Stream);
        decoder.push(Bytes::copy_from_slice(&hdr));
        assert!(decoder.try_decode().is_err());
    }

    #[test]
    fn decodes_back_to_back_messages() {
        let mut decoder = FrameDecoder::new(None, FramingKind::Stream);
        decoder.push(encode(&Message::from_body(&b"one"[..]), FramingKind::Stream));
        decoder.push(encode(&Message::from_body(&b"two"[..]), FramingKind::Stream));

        let first = decoder.try_decode().unwrap().unwrap();
        let second = decoder.try_decode().unwrap().unwrap();
        assert_eq!(first.body(), &Bytes::from_static(b"one"));
        assert_eq!(second.body(), &Bytes::from_static(b"two"));
    }

    #[test]
    fn ipc_framing_consumes_leading_msg_type_byte() {
        let msg = Message::from_body(&b"hello"[..]);
        let wire = encode(&msg, FramingKind::Ipc);
        assert_eq!(wire[0], SIPC_MSG_NORMAL);

        let mut decoder = FrameDecoder::new(None, FramingKind::Ipc);
        decoder.push(wire);
        let decoded = decoder.try_decode().unwrap().unwrap();
        assert_eq!(decoded.body(), &Bytes::from_static(b"hello"));
    }

    #[test]
    fn ipc_framing_decodes_back_to_back_messages() {
        let mut decoder = FrameDecoder::new(None, FramingKind::Ipc);
        decoder.push(encode(&Message::from_body(&b"one"[..]), FramingKind::Ipc));
        decoder.push(encode(&Message::from_body(&b"two"[..]), FramingKind::Ipc));

        let first = decoder.try_decode().unwrap().unwrap();
        let second = decoder.try_decode().unwrap().unwrap();
        assert_eq!(first.body(), &Bytes::from_static(b"one"));
        assert_eq!(second.body(), &Bytes::from_static(b"two"));
    }

    #[test]
    fn ipc_framing_rejects_unknown_msg_type() {
        let mut decoder = FrameDecoder::new(None, FramingKind::Ipc);
        decoder.push(Bytes::from_static(&[0xff]));
        assert!(decoder.try_decode().is_err());
    }
}
