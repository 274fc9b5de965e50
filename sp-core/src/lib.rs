//! SP core: runtime-agnostic building blocks for the Scalability Protocol
//! messaging kernel.
//!
//! - Generic FSM substrate: the `fsm_violation` totality panic shared by
//!   every component's handler (`fsm`).
//! - Single-shot timer and capped exponential backoff (`timer`).
//! - Big-endian wire codecs for length/id fields (`wire`).
//! - The framed message unit, an `sphdr`/`body` pair of refcounted chunks
//!   (`message`).
//! - Transport-agnostic endpoint addressing and parsing (`endpoint`).
//! - Socket configuration (`options`).
//! - SP protocol-id constants and peer-compatibility rules (`protocol`).
//! - Error taxonomy (`error`).
//! - Endpoint lifecycle event monitoring (`monitor`).
//! - The raw socket pump, pinned slab arena, and timeout helpers used by the
//!   transport layer above (`actor`, `alloc`, `timeout`, `tcp`, `ipc`,
//!   `buffer`).

#![deny(unsafe_code)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]

pub mod actor;
pub mod alloc;
pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod fsm;
#[cfg(unix)]
pub mod ipc;
pub mod message;
pub mod monitor;
pub mod options;
pub mod protocol;
pub mod tcp;
pub mod timeout;
pub mod timer;
pub mod wire;

/// A small prelude for downstream crates.
pub mod prelude {
    pub use crate::actor::{SocketActor, SocketEvent as ActorEvent, UserCmd};
    pub use crate::alloc::{IoArena, SlabMut};
    pub use crate::endpoint::{Endpoint, EndpointError};
    pub use crate::error::{Result, SpError};
    pub use crate::fsm::fsm_violation;
    pub use crate::message::Message;
    pub use crate::monitor::{create_monitor, SocketEvent as MonitorEvent, SocketMonitor};
    pub use crate::options::SocketOptions;
    pub use crate::timer::{Backoff, Timer};
    pub use crate::protocol;
}
