//! RESPONDENT protocol overlay: the answering-side peer of
//! [`crate::surveyor::SurveyorSocket`].
//!
//! Not one of the ten core components — added so SURVEYOR has a peer to
//! test against (seed scenario 6 binds a RESPONDENT to answer a survey).
//! Upstream's `respondent.c` is the same backtrace-stash-and-reattach shape
//! as `rep.c`: `recv` saves the survey's `sphdr`, `send` reattaches it.
//! A survey may go unanswered (the surveyor just times out); nothing here
//! requires every `recv` to be followed by a `send`.

use crate::pipebase::Pipebase;
use bytes::Bytes;
use sp_core::error::SpError;
use sp_core::message::Message;

/// A RESPONDENT socket: receive a survey, stash its `sphdr`, answer once.
pub struct RespondentSocket<P> {
    pipe: P,
    backtrace: Option<Bytes>,
}

impl<P: Pipebase> RespondentSocket<P> {
    #[must_use]
    pub fn new(pipe: P) -> Self {
        Self {
            pipe,
            backtrace: None,
        }
    }

    /// Receive the next survey.
    pub async fn recv(&mut self) -> Result<Bytes, SpError> {
        let msg = self.pipe.recv().await?;
        let (sphdr, body) = msg.into_parts();
        self.backtrace = Some(sphdr);
        Ok(body)
    }

    /// Answer the most recently received survey, reattaching its `sphdr`.
    /// Returns `-EFSM`-equivalent if no survey is outstanding.
    pub async fn send(&mut self, body: impl Into<Bytes>) -> Result<(), SpError> {
        let sphdr = self
            .backtrace
            .take()
            .ok_or_else(|| SpError::protocol("no survey to answer: call recv() before send()"))?;
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
            sp_core::protocol::SURVEYOR
        }
        fn is_peer(&self, protocol: u16) -> bool {
            protocol == sp_core::protocol::SURVEYOR
        }
    }

    #[compio::test]
    async fn send_without_recv_is_efsm_equivalent() {
        let pipe = MockPipe {
            incoming: VecDeque::new(),
            outgoing: Vec::new(),
        };
        let mut respondent = RespondentSocket::new(pipe);
        assert!(respondent.send(&b"answer"[..]).await.is_err());
    }

    #[compio::test]
    async fn recv_then_send_reattaches_sphdr() {
        let pipe = MockPipe {
            incoming: VecDeque::from([Message::new(&b"\x80\x00\x00\x01"[..], &b"ping"[..])]),
            outgoing: Vec::new(),
        };
        let mut respondent = RespondentSocket::new(pipe);
        let body = respondent.recv().await.unwrap();
        assert_eq!(body, Bytes::from_static(b"ping"));

        respondent.send(&b"answer"[..]).await.unwrap();
        let sent = &respondent.pipe.outgoing[0];
        assert_eq!(sent.sphdr(), &Bytes::from_static(b"\x80\x00\x00\x01"));
        assert_eq!(sent.body(), &Bytes::from_static(b"answer"));
    }

    #[compio::test]
    async fn survey_can_go_unanswered() {
        let pipe = MockPipe {
            incoming: VecDeque::from([Message::new(&b"\x80\x00\x00\x01"[..], &b"ping"[..])]),
            outgoing: Vec::new(),
        };
        let mut respondent = RespondentSocket::new(pipe);
        respondent.recv().await.unwrap();
        assert!(respondent.pipe.outgoing.is_empty());
    }
}
