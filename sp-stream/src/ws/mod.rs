//! WebSocket stream transport support (`sws`): the RFC 6455 opening
//! handshake variant of component G, plus the RFC 6455 data framing that
//! replaces the stream framer once that handshake completes.

pub mod frame;
pub mod handshake;
