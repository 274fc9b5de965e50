//! SURVEYOR protocol overlay (component I), grounded on upstream
//! `surveyor.c`.
//!
//! Upstream tags each survey with a 32-bit id (MSB set), fans it out over a
//! raw XSURVEYOR socket, and collects responses until a deadline timer
//! fires. The `IDLE/PASSIVE/ACTIVE/CANCELLING/STOPPING_TIMER/STOPPING`
//! chain exists to serialize `NN_SURVEYOR_ACTION_CANCEL` (a second `send`
//! while one survey is still open) against the timer callback; collapsed
//! into one task, a second `send` is just "overwrite `current`, skip
//! whatever was still ACTIVE" and the deadline is one more branch in the
//! `recv` `select!`.
//!
//! `nn_surveyor_send`'s `-EAGAIN` ("check `EVENT_OUT` before cancelling")
//! models raw-socket backpressure that doesn't apply over the unbounded
//! [`crate::pipebase::ChannelPipe`] channel this crate sends through, so
//! it's elided here — see `DESIGN.md`.

use crate::pipebase::Pipebase;
use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use rand::RngCore;
use sp_core::error::SpError;
use sp_core::message::Message;
use sp_core::timer::Timer;
use std::time::{Duration, Instant};

const SURVEYID_TAG: u32 = 0x8000_0000;

struct Current {
    id: u32,
    /// Absolute expiry, not a stored sleep future: the deadline timer is
    /// started once and must not be restarted by a stale response arriving
    /// mid-wait, so `recv`'s loop recomputes the remaining time on every
    /// iteration instead of re-arming a fixed-duration `Timer`.
    deadline_at: Instant,
}

/// A SURVEYOR socket: fan a survey out, collect responses until the
/// deadline. One survey open at a time — a new `send` discards whatever
/// responses were still outstanding for the previous one.
pub struct SurveyorSocket<P> {
    pipe: P,
    last_id: u32,
    deadline: Duration,
    current: Option<Current>,
}

impl<P: Pipebase> SurveyorSocket<P> {
    #[must_use]
    pub fn new(pipe: P, deadline: Duration) -> Self {
        Self {
            pipe,
            last_id: rand::thread_rng().next_u32(),
            deadline,
            current: None,
        }
    }

    /// Start a new survey, tagging `body` with a fresh survey id. Discards
    /// any survey still open, matching `NN_SURVEYOR_ACTION_CANCEL`.
    pub async fn send(&mut self, body: impl Into<Bytes>) -> Result<(), SpError> {
        self.last_id = self.last_id.wrapping_add(1);
        let id = self.last_id | SURVEYID_TAG;

        let mut sphdr = BytesMut::with_capacity(4);
        sphdr.resize(4, 0);
        sp_core::wire::put_u32(&mut sphdr, id);

        self.pipe.send(Message::new(sphdr.freeze(), body.into())).await?;
        self.current = Some(Current {
            id,
            deadline_at: Instant::now() + self.deadline,
        });
        Ok(())
    }

    /// Wait for the next response to the current survey. Returns `Ok(None)`
    /// once the deadline expires (`NN_SURVEYOR_TIMEDOUT`, surfaced once as
    /// `-ETIMEDOUT` upstream); responses after that point belong to no
    /// survey and are simply not read. Returns `Err` if no survey is open
    /// (`-EFSM`).
    pub async fn recv(&mut self) -> Result<Option<Bytes>, SpError> {
        loop {
            let Some(current) = self.current.as_ref() else {
                return Err(SpError::protocol(
                    "no survey in progress: call send() before recv()",
                ));
            };
            let id = current.id;
            let remaining = current.deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.current = None;
                return Ok(None);
            }
            let timer = Timer::new(remaining);

            futures::select! {
                incoming = self.pipe.recv().fuse() => {
                    let msg = incoming?;
                    if accept_response(&msg, id) {
                        return Ok(Some(msg.into_parts().1));
                    }
                    // stale response from a prior survey: ignore
                }
                () = timer.wait().fuse() => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }
}

/// A response is only valid if its `sphdr` is exactly 4 bytes and matches
/// the current survey id — `nn_surveyor_recv`'s stale-response filter.
fn accept_response(msg: &Message, expected_id: u32) -> bool {
    let sphdr = msg.sphdr();
    sphdr.len() == 4 && sp_core::wire::get_u32(sphdr) == expected_id
}
