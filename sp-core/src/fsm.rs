//! Generic FSM substrate.
//!
//! Every stateful component in this crate (the stream framer, the accepted/
//! connecting/binding endpoints, StreamHdr, REQ, SURVEYOR) is its own
//! tagged-variant state machine, collapsed from upstream's callback-driven
//! `(state, src, type)` dispatch into a single `compio` task per component —
//! see each module's own doc comment for how its particular chain of states
//! maps onto that task's control flow. What every one of those tasks shares
//! is the same assumption upstream's handlers are built on: every reachable
//! `(state, event)` combination has a branch, and reaching one that doesn't
//! is a programming error, not a recoverable condition. [`fsm_violation`] is
//! the panic that proves that, used at a handler's `match` in place of
//! upstream's `bad_state`/`bad_source`/`bad_action` assertions.

use std::fmt::Debug;

/// Raised when a handler is driven with a `(state, event)` combination it
/// has no transition for.
///
/// The design treats this as a programming error rather than a recoverable
/// `Result`: every component's handler is meant to be total over reachable
/// inputs, and a panic here is the proof that it is not. It must never be
/// reachable from externally-driven input — `sp-fuzz` exists to gain
/// confidence of that for the wire-facing decoders.
#[cold]
#[track_caller]
pub fn fsm_violation(component: &str, state: impl Debug, event: impl Debug) -> ! {
    panic!("FSM violation in {component}: no transition for state={state:?} event={event:?}");
}
