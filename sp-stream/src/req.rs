//! REQ protocol overlay (component H), grounded on upstream `req.c`.
//!
//! Upstream's `nn_req` sits on top of a raw load-balanced XREQ socket and
//! adds request ids, resend timing, and single-request-in-flight
//! cancellation; the `IDLE/PASSIVE/DELAYED/ACTIVE/TIMED_OUT/CANCELLING/
//! STOPPING_TIMER/DONE/STOPPING` chain exists because `nn_req` is driven by
//! asynchronous pipe-arrival and timer callbacks. Here there is exactly one
//! task per socket racing two event sources in a `select!` — a reply
//! arriving, and the resend timer — so the FSM collapses to one loop with
//! an `Option<Pending>` standing in for PASSIVE/DELAYED/ACTIVE/TIMED_OUT.

use crate::pipebase::Pipebase;
use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use rand::RngCore;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::timer::Timer;
use std::time::{Duration, Instant};

/// The top bit of a request id is always set; it marks the bottom of the
/// backtrace stack, per `nn_req_csend`'s `reqid | 0x80000000`.
const REQID_TAG: u32 = 0x8000_0000;

struct Pending {
    id: u32,
    request: Message,
    /// Absolute next-resend time, recomputed rather than re-armed on every
    /// `recv` loop iteration — an ignored stale reply must not push the
    /// resend out further, only an actual timeout or resend does.
    resend_at: Instant,
}

/// A REQ socket: strict one-request-at-a-time request/reply with resend on
/// timeout. Upstream allows only one outstanding request per socket, and a
/// new `send` cancels whatever is in flight.
pub struct ReqSocket<P> {
    pipe: P,
    last_id: u32,
    resend_ivl: Duration,
    pending: Option<Pending>,
}

impl<P: Pipebase> ReqSocket<P> {
    /// `last_id` seeds from a random value, matching `nn_random_generate`
    /// into `self->lastid` — avoids request-id collisions across restarts
    /// talking to a REP peer that doesn't reset its own dedup state.
    #[must_use]
    pub fn new(pipe: P, resend_ivl: Duration) -> Self {
        Self {
            pipe,
            last_id: rand::thread_rng().next_u32(),
            resend_ivl,
            pending: None,
        }
    }

    /// Submit a new request. Cancels and replaces any request currently in
    /// flight, mirroring `ACTIVE/SENT` and `DONE/SENT`: "a new user send
    /// cancels the prior".
    pub async fn send(&mut self, body: impl Into<Bytes>) -> Result<(), SpError> {
        self.last_id = self.last_id.wrapping_add(1);
        let id = self.last_id | REQID_TAG;

        let mut sphdr = BytesMut::with_capacity(4);
        sphdr.resize(4, 0);
        sp_core::wire::put_u32(&mut sphdr, id);

        let request = Message::new(sphdr.freeze(), body.into());
        self.pipe.send(request.clone()).await?;
        self.pending = Some(Pending {
            id,
            request,
            resend_at: Instant::now() + self.resend_ivl,
        });
        Ok(())
    }

    /// Wait for the reply to the current request, resending on every
    /// `resend_ivl` timeout until one arrives. Returns an error if no
    /// request is outstanding, matching `nn_req_crecv`'s `-EFSM` when
    /// `!nn_req_inprogress`.
    pub async fn recv(&mut self) -> Result<Bytes, SpError> {
        loop {
            let Some(pending) = self.pending.as_ref() else {
                return Err(SpError::protocol(
                    "no request in progress: call send() before recv()",
                ));
            };
            let id = pending.id;
            let remaining = pending.resend_at.saturating_duration_since(Instant::now());

            if remaining.is_zero() {
                let request = pending.request.clone();
                self.pipe.send(request).await?;
                match self.pending.as_mut() {
                    Some(pending) => pending.resend_at = Instant::now() + self.resend_ivl,
                    None => sp_core::fsm::fsm_violation("req", "resend-due", "pending cleared mid-resend"),
                }
                continue;
            }
            let timer = Timer::new(remaining);

            futures::select! {
                incoming = self.pipe.recv().fuse() => {
                    let msg = incoming?;
                    if accept_reply(&msg, id) {
                        self.pending = None;
                        return Ok(msg.into_parts().1);
                    }
                    // stale or malformed reply: ignore and keep waiting
                }
                () = timer.wait().fuse() => {
                    let request = pending.request.clone();
                    self.pipe.send(request).await?;
                    match self.pending.as_mut() {
                        Some(pending) => pending.resend_at = Instant::now() + self.resend_ivl,
                        None => sp_core::fsm::fsm_violation("req", "resend-timer", "pending cleared mid-resend"),
                    }
                }
            }
        }
    }
}

/// A reply is only valid if its `sphdr` is exactly 4 bytes, MSB set, and
/// equal to the outstanding request id — `nn_req_in`'s malformed/stale
/// filtering.
fn accept_reply(msg: &Message, expected_id: u32) -> bool {
    let sphdr = msg.sphdr();
    if sphdr.len() != 4 {
        return false;
    }
    let reqid = sp_core::wire::get_u32(sphdr);
    reqid & REQID_TAG != 0 && reqid == expected_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct MockPipe {
        incoming: VecDeque<Message>,
    }

    #[async_trait]
    impl Pipebase for MockPipe {
        async fn send(&mut self, _msg: Message) -> Result<(), SpError> {
            Ok(())
        }
        async fn recv(&mut self) -> Result<Message, SpError> {
            self.incoming
                .pop_front()
                .ok_or_else(|| SpError::transient("no more mock replies"))
        }
        fn peer_protocol(&self) -> u16 {
            0
        }
        fn is_peer(&self, _protocol: u16) -> bool {
            true
        }
    }

    #[test]
    fn accept_reply_requires_msb_and_matching_id() {
        let good = Message::new(&[0x80, 0, 0, 1][..], &b""[..]);
        assert!(accept_reply(&good, 0x8000_0001));

        let wrong_id = Message::new(&[0x80, 0, 0, 2][..], &b""[..]);
        assert!(!accept_reply(&wrong_id, 0x8000_0001));

        let no_msb = Message::new(&[0, 0, 0, 1][..], &b""[..]);
        assert!(!accept_reply(&no_msb, 1));

        let wrong_len = Message::new(&[0, 0, 1][..], &b""[..]);
        assert!(!accept_reply(&wrong_len, 1));
    }

    #[compio::test]
    async fn recv_without_send_is_efsm_equivalent() {
        let pipe = MockPipe {
            incoming: VecDeque::new(),
        };
        let mut req = ReqSocket::new(pipe, Duration::from_millis(50));
        assert!(req.recv().await.is_err());
    }

    #[compio::test]
    async fn send_then_recv_round_trips_matching_reply() {
        let pipe = MockPipe {
            incoming: VecDeque::new(),
        };
        let mut req = ReqSocket::new(pipe, Duration::from_millis(50));
        req.send(&b"ping"[..]).await.unwrap();

        let id = req.pending.as_ref().unwrap().id;
        let mut sphdr = BytesMut::with_capacity(4);
        sphdr.resize(4, 0);
        sp_core::wire::put_u32(&mut sphdr, id);
        req.pipe
            .incoming
            .push_back(Message::new(sphdr.freeze(), &b"pong"[..]));

        let reply = req.recv().await.unwrap();
        assert_eq!(reply, Bytes::from_static(b"pong"));
    }

    #[compio::test]
    async fn stale_reply_is_ignored_until_matching_one_arrives() {
        let pipe = MockPipe {
            incoming: VecDeque::new(),
        };
        let mut req = ReqSocket::new(pipe, Duration::from_millis(50));
        req.send(&b"ping"[..]).await.unwrap();
        let id = req.pending.as_ref().unwrap().id;

        // stale reply from a previous, already-completed request
        let mut stale = BytesMut::with_capacity(4);
        stale.resize(4, 0);
        sp_core::wire::put_u32(&mut stale, id.wrapping_sub(1) | REQID_TAG);
        req.pipe
            .incoming
            .push_back(Message::new(stale.freeze(), &b"old"[..]));

        let mut fresh = BytesMut::with_capacity(4);
        fresh.resize(4, 0);
        sp_core::wire::put_u32(&mut fresh, id);
        req.pipe
            .incoming
            .push_back(Message::new(fresh.freeze(), &b"pong"[..]));

        let reply = req.recv().await.unwrap();
        assert_eq!(reply, Bytes::from_static(b"pong"));
    }
}
