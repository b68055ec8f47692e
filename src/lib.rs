//! hsm-dispatch: a hierarchical state-machine dispatch engine
//!
//! A component is written as a current state plus one optional fallback
//! (parent) state, each with a single event handler. The engine turns raw
//! host events into handler calls, runs the two-phase EXIT/ENTRY transition
//! handshake, and owns the lifecycle of event payloads on the mailbox path.
//!
//! # Core Concepts
//!
//! - **Events**: 32-bit codes; the four low bits are the ENTRY, EXIT, TIMED
//!   and INVALID sentinels, everything above is for the application
//! - **Delivery**: either a mailbox [`Transport`] carrying envelopes, or a
//!   [`SignalPort`] carrying one bit per event
//! - **Dispatch**: current state first, parent only if the current state
//!   returned [`StateResult::Ignored`]
//! - **Handshake**: `transition_to` raises EXIT; the exiting state calls
//!   `complete_transition` when it is done
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hsm_dispatch::{user_events, ContextId, SignalBoard, State, StateMachine, StateResult};
//!
//! user_events! {
//!     struct Blink {
//!         TOGGLE,
//!     }
//! }
//!
//! let board = Arc::new(SignalBoard::new());
//! let mut sm = StateMachine::builder()
//!     .name("led")
//!     .signals(board.clone())
//!     .user_events(Blink::ALL)
//!     .build()
//!     .unwrap();
//!
//! // The parent swallows TOGGLE for any state that ignores it.
//! sm.set_parent(Some(Rc::new(State::with_handler("Root", |event, _| {
//!     if event.is(Blink::TOGGLE) {
//!         StateResult::Handled
//!     } else {
//!         StateResult::Ignored
//!     }
//! }))));
//!
//! sm.init_state(Rc::new(State::new("Off")), None).unwrap();
//! sm.raise_event(Blink::TOGGLE, None).unwrap();
//!
//! // ENTRY and TOGGLE arrive together and are dispatched lowest bit first.
//! let raw = board.wait(ContextId::current(), Some(Duration::ZERO));
//! sm.run(raw);
//! assert_eq!(sm.current().map(|s| s.name()), Some("Off"));
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod host;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder};
pub use core::{Envelope, EventCode, Msg, MsgAllocator, Sentinel, SignalSet, TransitionHistory};
pub use engine::{
    ContextId, Origin, RaiseError, Raised, Raiser, RawEvent, SignalPort, State, StateEvent,
    StateMachine, StateRef, StateResult, TransitionError, Transport,
};
pub use host::{mailbox, Mailbox, MailboxSender, SignalBoard};
