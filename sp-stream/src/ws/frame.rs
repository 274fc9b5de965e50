//! WebSocket data framing (RFC 6455 Section 5): once the opening handshake
//! completes, each SP message rides as one complete (non-fragmented) WS
//! frame instead of the TCP/IPC length prefix — opcode, FIN, optional mask,
//! and a length encoded in 7/16/64-bit form depending on payload size. A
//! frame's payload is `sphdr ++ body` back to back, exactly like the
//! stream framer's length-prefixed payload; only the envelope differs.
//!
//! Masking direction follows RFC 6455 Section 5.1: a client always masks
//! its outgoing frames with a fresh random key, a server never masks.
//! [`Role`] selects which side a given connection is playing.

use bytes::{Bytes, BytesMut};
use compio::io::{AsyncReadExt, AsyncWriteExt};
use rand::RngCore;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::options::WsMsgType;

const OP_CONTINUATION: u8 = 0x0;
const OP_TEXT: u8 = 0x1;
const OP_BINARY: u8 = 0x2;
const OP_CLOSE: u8 = 0x8;
const OP_PING: u8 = 0x9;
const OP_PONG: u8 = 0xA;

/// Which side of the connection this pump is playing, for masking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Encode `msg` as a single unfragmented WS data frame (`sphdr ++ body` as
/// the payload), masked if `role` is [`Role::Client`].
#[must_use]
pub fn encode_message(msg: &Message, msg_type: WsMsgType, role: Role) -> Bytes {
    let mut payload = BytesMut::with_capacity(msg.wire_len());
    payload.extend_from_slice(msg.sphdr());
    payload.extend_from_slice(msg.body());
    let opcode = match msg_type {
        WsMsgType::Text => OP_TEXT,
        WsMsgType::Binary => OP_BINARY,
    };
    encode_frame(opcode, &payload, role)
}

fn encode_frame(opcode: u8, payload: &[u8], role: Role) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + 14);
    out.extend_from_slice(&[0x80 | opcode]);

    let masked = matches!(role, Role::Client);
    let mask_bit = if masked { 0x80 } else { 0x00 };

    let len = payload.len();
    if len < 126 {
        out.extend_from_slice(&[mask_bit | len as u8]);
    } else if len <= u16::MAX as usize {
        out.extend_from_slice(&[mask_bit | 126]);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.extend_from_slice(&[mask_bit | 127]);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if masked {
        let mut key = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut key);
        out.extend_from_slice(&key);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    } else {
        out.extend_from_slice(payload);
    }

    out.freeze()
}

/// Read one complete SP message off a WS-framed stream, transparently
/// answering pings and skipping any other control frames encountered along
/// the way. Returns [`SpError::peer_gone`] on a close frame, and
/// [`SpError::protocol`] on a fragmented (non-FIN) data frame, which this
/// crate does not support.
pub async fn read_message<S>(
    stream: &mut S,
    max_msg_size: Option<usize>,
    role: Role,
) -> Result<Message, SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    loop {
        let (fin, opcode, payload) = read_frame(stream, max_msg_size).await?;
        if !fin {
            return Err(SpError::protocol("fragmented WS frames are not supported"));
        }
        match opcode {
            OP_CLOSE => return Err(SpError::peer_gone("WS close frame received")),
            OP_PING => {
                let pong = encode_frame(OP_PONG, &payload, role);
                let compio::buf::BufResult(res, _) = stream.write_all(pong.to_vec()).await;
                res.map_err(SpError::Io)?;
            }
            OP_PONG => {}
            OP_TEXT | OP_BINARY => return Ok(Message::from_body(payload)),
            OP_CONTINUATION => {
                return Err(SpError::protocol("unexpected WS continuation frame"))
            }
            other => {
                return Err(SpError::protocol(format!(
                    "unsupported WS opcode {other:#x}"
                )))
            }
        }
    }
}

async fn read_frame<S>(
    stream: &mut S,
    max_msg_size: Option<usize>,
) -> Result<(bool, u8, Bytes), SpError>
where
    S: compio::io::AsyncRead + Unpin,
{
    let header = read_exact(stream, 2).await?;
    let fin = header[0] & 0x80 != 0;
    let opcode = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let len7 = header[1] & 0x7F;

    let len: u64 = match len7 {
        126 => {
            let ext = read_exact(stream, 2).await?;
            u16::from_be_bytes([ext[0], ext[1]]) as u64
        }
        127 => {
            let ext = read_exact(stream, 8).await?;
            u64::from_be_bytes(ext[..8].try_into().unwrap())
        }
        n => n as u64,
    };

    if let Some(max) = max_msg_size {
        if len > max as u64 {
            return Err(SpError::policy_exceeded(len as usize, max));
        }
    }

    let mask_key = if masked {
        let key = read_exact(stream, 4).await?;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    let mut payload = read_exact(stream, len as usize).await?;
    if let Some(key) = mask_key {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= key[i % 4];
        }
    }

    Ok((fin, opcode, Bytes::from(payload)))
}

async fn read_exact<S>(stream: &mut S, n: usize) -> Result<Vec<u8>, SpError>
where
    S: compio::io::AsyncRead + Unpin,
{
    let mut acc = Vec::with_capacity(n);
    while acc.len() < n {
        let remaining = n - acc.len();
        let compio::buf::BufResult(res, chunk) = stream.read(vec![0u8; remaining]).await;
        let read = res.map_err(SpError::Io)?;
        if read == 0 {
            return Err(SpError::peer_gone("EOF mid WS frame"));
        }
        acc.extend_from_slice(&chunk[..read]);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_is_masked_and_server_frame_is_not() {
        let msg = Message::from_body(&b"hi"[..]);
        let client_frame = encode_message(&msg, WsMsgType::Binary, Role::Client);
        let server_frame = encode_message(&msg, WsMsgType::Binary, Role::Server);

        assert_eq!(client_frame[1] & 0x80, 0x80);
        assert_eq!(server_frame[1] & 0x80, 0x00);
        assert_eq!(server_frame[2..], *b"hi");
    }

    #[test]
    fn small_payload_uses_7_bit_length() {
        let msg = Message::from_body(&b"hi"[..]);
        let frame = encode_message(&msg, WsMsgType::Binary, Role::Server);
        assert_eq!(frame[0], 0x80 | OP_BINARY);
        assert_eq!(frame[1], 2);
    }

    #[test]
    fn large_payload_uses_16_bit_extended_length() {
        let body = vec![0u8; 200];
        let msg = Message::from_body(body.clone());
        let frame = encode_message(&msg, WsMsgType::Binary, Role::Server);
        assert_eq!(frame[1], 126);
        let len = u16::from_be_bytes([frame[2], frame[3]]);
        assert_eq!(len as usize, body.len());
    }

    #[compio::test]
    async fn round_trips_a_masked_client_frame_over_a_loopback_socket() {
        use compio::net::{TcpListener, TcpStream};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = compio::runtime::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let msg = Message::from_body(&b"hello over ws"[..]);
            let frame = encode_message(&msg, WsMsgType::Binary, Role::Client);
            let compio::buf::BufResult(res, _) = stream.write_all(frame.to_vec()).await;
            res.unwrap();
        });

        let (mut server, _) = listener.accept().await.unwrap();
        let received = read_message(&mut server, None, Role::Server).await.unwrap();
        assert_eq!(received.body(), &Bytes::from_static(b"hello over ws"));

        writer.await.unwrap();
    }
}
