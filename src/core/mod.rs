//! Core data types of the dispatch engine.
//!
//! This module holds the passive pieces the engine moves around:
//! - Event codes and the four reserved sentinels
//! - The 32-bit signal word and its ascending iterator
//! - Envelopes and the allocator contract that backs them
//! - Bounded transition history
//!
//! Nothing in here dispatches anything; see [`crate::engine`] for that.

mod alloc;
mod envelope;
mod event;
mod history;
mod signal;

pub use alloc::{AllocError, BoundedAllocator, MsgAllocator, SystemAllocator};
pub use envelope::{Envelope, Msg, MsgId, OwnedMsg, Payload, ENVELOPE_SIZE};
pub use event::{EventCode, Sentinel};
pub use history::{TransitionHistory, TransitionKind, TransitionRecord};
pub use signal::{SignalEvents, SignalSet};
