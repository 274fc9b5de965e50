//! Message: the unit of framing.
//!
//! Every message carries two independent chunk-references: an `sphdr`
//! ("scalability-protocol header") and a `body`. Protocol overlays
//! (REQ, SURVEYOR) read and rewrite `sphdr` to carry request/survey ids
//! without touching `body`; the stream framer (component C) is agnostic to
//! `sphdr`'s contents and frames `sphdr ++ body` back-to-back on the wire.
//!
//! `Bytes` is already the reference-counted immutable chunk the original
//! design's "refcounted message chunk" describes — cloning a `Message` is
//! two atomic refcount bumps, never a copy.

use bytes::Bytes;

/// A framed message: an `sphdr` prefix plus a `body`.
///
/// Invariant: constructing, moving, or cloning a `Message` never copies the
/// underlying bytes. `sphdr` is conventionally empty for raw/XREQ-level
/// sends and non-empty once a protocol overlay (REQ/SURVEYOR) has tagged it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    sphdr: Bytes,
    body: Bytes,
}

impl Message {
    /// Build a message with an empty `sphdr`.
    #[must_use]
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self {
            sphdr: Bytes::new(),
            body: body.into(),
        }
    }

    /// Build a message with both parts already known (e.g. after a protocol
    /// overlay has tagged `sphdr` with a request id).
    #[must_use]
    pub fn new(sphdr: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            sphdr: sphdr.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn sphdr(&self) -> &Bytes {
        &self.sphdr
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Total wire length: `sphdr.len() + body.len()`. This is what gets
    /// announced as the frame's length prefix.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.sphdr.len() + self.body.len()
    }

    /// Replace `sphdr`, keeping `body` untouched. Used by REQ/SURVEYOR to
    /// prepend their id header before handing the message to the framer,
    /// and to strip it back off on receive.
    #[must_use]
    pub fn with_sphdr(mut self, sphdr: impl Into<Bytes>) -> Self {
        self.sphdr = sphdr.into();
        self
    }

    /// Split back into `(sphdr, body)`, consuming the message.
    #[must_use]
    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.sphdr, self.body)
    }
}
