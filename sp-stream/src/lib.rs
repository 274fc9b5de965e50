//! # sp-stream
//!
//! Stream transport pipeline for the SP messaging kernel: frame-length
//! codec, StreamHdr handshake (plain SP header and the WebSocket opening
//! handshake variant), accepted-side/connecting-side/binding-side endpoint
//! tasks, and the REQ/SURVEYOR protocol overlays that sit on top of a
//! running pipe.
//!
//! ## Layout
//!
//! - [`config`] — buffer sizing knobs shared across transports.
//! - [`framing`] — the length-prefixed frame codec (component C).
//! - [`streamhdr`] — the 8-byte SP header handshake (component G).
//! - [`ws`] — the RFC 6455 opening handshake, an alternative to `streamhdr`
//!   for the `sws`/`cws`/`bws` transports.
//! - [`pipebase`] — [`pipebase::Pipebase`], the trait protocol overlays talk
//!   to, and [`pipebase::ChannelPipe`], its channel-backed implementation.
//! - [`active`] — the active-link read/write pump shared by the accepted
//!   and connecting sides.
//! - [`accepted`] — accepted-side endpoint (component D).
//! - [`connecting`] — connecting-side endpoint with reconnect backoff
//!   (component E).
//! - [`binding`] — binding/listening-side endpoint (component F).
//! - [`req`] — the REQ protocol overlay (component H).
//! - [`surveyor`] — the SURVEYOR protocol overlay (component I).
//! - [`rep`], [`respondent`] — minimal reply-side peers for `req`/`surveyor`,
//!   not part of the core component set but needed to exercise them.
//!
//! This crate is runtime-agnostic at the framing/handshake/overlay layer and
//! uses `compio` for the actual socket I/O in the endpoint tasks.

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_async)]
#![allow(clippy::let_underscore_future)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::missing_errors_doc)] // Will add gradually
#![allow(clippy::doc_markdown)] // Too many false positives
#![allow(clippy::while_let_loop)] // Sometimes clearer as explicit loop
#![allow(clippy::option_if_let_else)] // Sometimes clearer as if/else
#![allow(clippy::never_loop)] // State machines use loop with early returns
#![allow(clippy::too_many_arguments)] // Endpoint tasks thread a lot of shared state through

pub mod config;
pub mod framing;
pub mod streamhdr;
pub mod ws;

pub mod pipebase;

pub mod active;

pub mod accepted;
pub mod binding;
pub mod connecting;

pub mod req;
pub mod surveyor;

// Minimal reply-side peers for req/surveyor — see their module docs.
pub mod rep;
pub mod respondent;

pub use pipebase::{ChannelPipe, Pipebase};
pub use rep::RepSocket;
pub use req::ReqSocket;
pub use respondent::RespondentSocket;
pub use surveyor::SurveyorSocket;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use sp_stream::prelude::*;
/// ```
pub mod prelude {
    pub use super::accepted;
    pub use super::binding;
    pub use super::connecting;
    pub use super::{ChannelPipe, Pipebase, RepSocket, ReqSocket, RespondentSocket, SurveyorSocket};
    pub use bytes::Bytes;
}
