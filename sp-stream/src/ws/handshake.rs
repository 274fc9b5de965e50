//! WebSocket opening handshake (RFC 6455 Section 4), the `sws` transport's
//! variant of the StreamHdr protocol-header exchange: instead of an 8-byte
//! SP header, peers trade an HTTP/1.1 Upgrade request/response, and the SP
//! protocol id rides in the `Sec-WebSocket-Protocol` subprotocol negotiation
//! as a `<token>.sp.nanomsg.org` value (`ws_handshake.c`) rather than the
//! header's byte 4-5.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use compio::io::{AsyncReadExt, AsyncWriteExt};
use rand::RngCore;
use sha1::{Digest, Sha1};
use sp_core::error::SpError;
use sp_core::protocol;

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute `Sec-WebSocket-Accept` from a client's `Sec-WebSocket-Key`, per
/// RFC 6455 Section 4.2.2: SHA-1(key ++ GUID), then base64.
#[must_use]
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn generate_client_key() -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    BASE64.encode(nonce)
}

struct Request {
    method: String,
    headers: Vec<(String, String)>,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn parse_http_message(raw: &str) -> Result<(String, Vec<(String, String)>), SpError> {
    let mut lines = raw.split("\r\n");
    let start_line = lines
        .next()
        .ok_or_else(|| SpError::protocol("empty HTTP upgrade message"))?;
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    Ok((start_line.to_string(), headers))
}

/// Read bytes off `stream` until the `\r\n\r\n` header terminator, returning
/// the header text (without the terminator).
async fn read_headers<S>(stream: &mut S) -> Result<String, SpError>
where
    S: compio::io::AsyncRead + Unpin,
{
    use compio::buf::BufResult;

    let mut acc = Vec::new();
    loop {
        let BufResult(res, buf) = stream.read(vec![0u8; 1]).await;
        let n = res.map_err(SpError::Io)?;
        if n == 0 {
            return Err(SpError::protocol("EOF before end of HTTP headers"));
        }
        acc.push(buf[0]);
        if acc.ends_with(b"\r\n\r\n") {
            break;
        }
        if acc.len() > 16 * 1024 {
            return Err(SpError::policy_exceeded(acc.len(), 16 * 1024));
        }
    }
    String::from_utf8(acc).map_err(|_| SpError::protocol("non-UTF8 HTTP headers"))
}

/// Validate a client's upgrade request and extract the `Sec-WebSocket-Key`
/// plus the SP protocol id encoded in its `Sec-WebSocket-Protocol` token.
fn validate_client_request(req: &Request) -> Result<(String, u16), SpError> {
    if !req.method.eq_ignore_ascii_case("GET") {
        return Err(SpError::protocol("WS upgrade method must be GET"));
    }
    match find_header(&req.headers, "Upgrade") {
        Some(v) if v.to_ascii_lowercase().contains("websocket") => {}
        _ => return Err(SpError::protocol("missing or invalid Upgrade header")),
    }
    match find_header(&req.headers, "Connection") {
        Some(v) if v.to_ascii_lowercase().contains("upgrade") => {}
        _ => return Err(SpError::protocol("missing or invalid Connection header")),
    }
    let key = find_header(&req.headers, "Sec-WebSocket-Key")
        .ok_or_else(|| SpError::protocol("missing Sec-WebSocket-Key"))?
        .to_string();
    match find_header(&req.headers, "Sec-WebSocket-Version") {
        Some("13") => {}
        _ => return Err(SpError::protocol("missing or invalid Sec-WebSocket-Version")),
    }
    let token = find_header(&req.headers, "Sec-WebSocket-Protocol")
        .ok_or_else(|| SpError::protocol("missing Sec-WebSocket-Protocol"))?;
    let protocol = protocol::from_ws_subprotocol(token)
        .ok_or_else(|| SpError::protocol(format!("unrecognized Sec-WebSocket-Protocol token {token}")))?;
    Ok((key, protocol))
}

/// Server side: read the client's upgrade request, validate it, check the
/// peer's advertised protocol against `accepts`, and respond with `101
/// Switching Protocols` — or the spec-mandated `400 Incompatible Socket
/// Type` if `accepts` rejects it, before ever sending `101` — or a generic
/// `400 Bad Request` on any other validation failure. Returns the peer's
/// advertised SP protocol id on success.
pub async fn server_handshake<S>(
    stream: &mut S,
    local_protocol: u16,
    accepts: impl Fn(u16) -> bool,
) -> Result<u16, SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    let raw = read_headers(stream).await?;
    let (start_line, headers) = parse_http_message(&raw)?;
    let method = start_line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    let req = Request { method, headers };

    let (client_key, peer_protocol) = match validate_client_request(&req) {
        Ok(parsed) => parsed,
        Err(e) => {
            let body = format!("Bad Request: {e}");
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\n\
                 Content-Type: text/plain\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            let _ = stream.write_all(response.into_bytes()).await;
            return Err(e);
        }
    };

    if !accepts(peer_protocol) {
        let response = "HTTP/1.1 400 Incompatible Socket Type\r\n\
                         Connection: close\r\n\
                         \r\n"
            .to_string();
        let _ = stream.write_all(response.into_bytes()).await;
        return Err(SpError::protocol(format!(
            "peer advertised incompatible protocol {peer_protocol}"
        )));
    }

    let accept = compute_accept_key(&client_key);
    let local_token = protocol::ws_subprotocol(local_protocol)
        .ok_or_else(|| SpError::protocol(format!("no WS subprotocol token for protocol {local_protocol}")))?;
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         Sec-WebSocket-Protocol: {local_token}\r\n\
         \r\n"
    );
    let compio::buf::BufResult(res, _) = stream.write_all(response.into_bytes()).await;
    res.map_err(SpError::Io)?;
    Ok(peer_protocol)
}

/// Client side: send an upgrade request advertising `local_protocol`, then
/// validate the server's `101` response and return its advertised protocol.
pub async fn client_handshake<S>(
    stream: &mut S,
    host: &str,
    local_protocol: u16,
) -> Result<u16, SpError>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    let key = generate_client_key();
    let local_token = protocol::ws_subprotocol(local_protocol)
        .ok_or_else(|| SpError::protocol(format!("no WS subprotocol token for protocol {local_protocol}")))?;
    let request = format!(
        "GET / HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Protocol: {local_token}\r\n\
         \r\n"
    );
    let compio::buf::BufResult(res, _) = stream.write_all(request.into_bytes()).await;
    res.map_err(SpError::Io)?;

    let raw = read_headers(stream).await?;
    let (start_line, headers) = parse_http_message(&raw)?;
    if !start_line.contains("101") {
        return Err(SpError::protocol(format!(
            "WS upgrade rejected: {start_line}"
        )));
    }
    let accept = find_header(&headers, "Sec-WebSocket-Accept")
        .ok_or_else(|| SpError::protocol("missing Sec-WebSocket-Accept"))?;
    if accept != compute_accept_key(&key) {
        return Err(SpError::protocol("Sec-WebSocket-Accept mismatch"));
    }
    let token = find_header(&headers, "Sec-WebSocket-Protocol")
        .ok_or_else(|| SpError::protocol("missing Sec-WebSocket-Protocol"))?;
    let peer_protocol = protocol::from_ws_subprotocol(token)
        .ok_or_else(|| SpError::protocol(format!("unrecognized Sec-WebSocket-Protocol token {token}")))?;
    Ok(peer_protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_example() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn validate_client_request_extracts_key_and_protocol() {
        let req = Request {
            method: "GET".to_string(),
            headers: vec![
                ("Upgrade".into(), "websocket".into()),
                ("Connection".into(), "Upgrade".into()),
                ("Sec-WebSocket-Key".into(), "dGhlIHNhbXBsZSBub25jZQ==".into()),
                ("Sec-WebSocket-Version".into(), "13".into()),
                ("Sec-WebSocket-Protocol".into(), "req.sp.nanomsg.org".into()),
            ],
        };
        let (key, protocol) = validate_client_request(&req).unwrap();
        assert_eq!(key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(protocol, sp_core::protocol::REQ);
    }

    #[test]
    fn validate_client_request_rejects_unknown_subprotocol_token() {
        let req = Request {
            method: "GET".to_string(),
            headers: vec![
                ("Upgrade".into(), "websocket".into()),
                ("Connection".into(), "Upgrade".into()),
                ("Sec-WebSocket-Key".into(), "dGhlIHNhbXBsZSBub25jZQ==".into()),
                ("Sec-WebSocket-Version".into(), "13".into()),
                ("Sec-WebSocket-Protocol".into(), "bogus.sp.nanomsg.org".into()),
            ],
        };
        assert!(validate_client_request(&req).is_err());
    }

    #[test]
    fn validate_client_request_rejects_missing_upgrade() {
        let req = Request {
            method: "GET".to_string(),
            headers: vec![("Connection".into(), "Upgrade".into())],
        };
        assert!(validate_client_request(&req).is_err());
    }
}
