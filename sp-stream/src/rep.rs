//! REP protocol overlay: the reply-side peer of [`crate::req::ReqSocket`].
//!
//! Not one of the ten core components — added so REQ has a peer to test
//! against (seed scenarios 1, 4, 6 all bind a REP as the request target).
//! Upstream's `rep.c` is nearly a pass-through over raw XREP: on `recv` it
//! stashes the backtrace (here, just the request's `sphdr` — this overlay
//! talks over a single [`crate::pipebase::Pipebase`] pipe, not a
//! load-balanced fan-out, so there's no multi-hop routing stack to save),
//! and on the next `send` re-attaches it unchanged. A `send` with no prior
//! `recv`, or two `recv`s in a row without an intervening `send`, is
//! `-EFSM` upstream; modeled the same way here.

use crate::pipebase::Pipebase;
use bytes::Bytes;
use sp_core::error::SpError;
use sp_core::message::Message;

/// A REP socket: receive a request, stash its `sphdr`, reply once.
pub struct RepSocket<P> {
    pipe: P,
    backtrace: Option<Bytes>,
}

impl<P: Pipebase> RepSocket<P> {
    #[must_use]
    pub fn new(pipe: P) -> Self {
        Self {
            pipe,
            backtrace: None,
        }
    }

    /// Receive the next request. Replaces any backtrace left over from a
    /// request that was never replied to, matching upstream's "a second
    /// `recv` without a `send` discards the first request".
    pub async fn recv(&mut self) -> Result<Bytes, SpError> {
        let msg = self.pipe.recv().await?;
        let (sphdr, body) = msg.into_parts();
        self.backtrace = Some(sphdr);
        Ok(body)
    }

    /// Reply to the most recently received request, reattaching its
    /// `sphdr`. Returns `-EFSM`-equivalent if no request is outstanding.
    pub async fn send(&mut self, body: impl Into<Bytes>) -> Result<(), SpError> {
        let sphdr = self
            .backtrace
            .take()
            .ok_or_else(|| SpError::protocol("no request to reply to: call recv() before send()"))?;
        self.pipe.send(Message::new(sphdr, body.into())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct MockPipe {
        incoming: VecDeque<Message>,
        outgoing: Vec<Message>,
    }

    #[async_trait]
    impl Pipebase for MockPipe {
        async fn send(&mut self, msg: Message) -> Result<(), SpError> {
            self.outgoing.push(msg);
            Ok(())
        }
        async fn recv(&mut self) -> Result<Message, SpError> {
            self.incoming
                .pop_front()
                .ok_or_else(|| SpError::protocol("no more messages"))
        }
        fn peer_protocol(&self) -> u16 {
            sp_core::protocol::REQ
        }
        fn is_peer(&self, protocol: u16) -> bool {
            protocol == sp_core::protocol::REQ
        }
    }

    #[compio::test]
    async fn send_without_recv_is_efsm_equivalent() {
        let pipe = MockPipe {
            incoming: VecDeque::new(),
            outgoing: Vec::new(),
        };
        let mut rep = RepSocket::new(pipe);
        assert!(rep.send(&b"pong"[..]).await.is_err());
    }

    #[compio::test]
    async fn recv_then_send_reattaches_sphdr() {
        let pipe = MockPipe {
            incoming: VecDeque::from([Message::new(&b"\x80\x00\x00\x01"[..], &b"ping"[..])]),
            outgoing: Vec::new(),
        };
        let mut rep = RepSocket::new(pipe);
        let body = rep.recv().await.unwrap();
        assert_eq!(body, Bytes::from_static(b"ping"));

        rep.send(&b"pong"[..]).await.unwrap();
        let sent = &rep.pipe.outgoing[0];
        assert_eq!(sent.sphdr(), &Bytes::from_static(b"\x80\x00\x00\x01"));
        assert_eq!(sent.body(), &Bytes::from_static(b"pong"));
    }

    #[compio::test]
    async fn second_recv_without_send_discards_first_backtrace() {
        let pipe = MockPipe {
            incoming: VecDeque::from([
                Message::new(&b"\x80\x00\x00\x01"[..], &b"first"[..]),
                Message::new(&b"\x80\x00\x00\x02"[..], &b"second"[..]),
            ]),
            outgoing: Vec::new(),
        };
        let mut rep = RepSocket::new(pipe);
        rep.recv().await.unwrap();
        rep.recv().await.unwrap();
        rep.send(&b"pong"[..]).await.unwrap();
        let sent = &rep.pipe.outgoing[0];
        assert_eq!(sent.sphdr(), &Bytes::from_static(b"\x80\x00\x00\x02"));
    }
}
