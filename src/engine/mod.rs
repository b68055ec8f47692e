//! The state-dispatch engine.
//!
//! This module turns raw host events into handler calls and owns the
//! transition protocol.
//!
//! # Key Concepts
//!
//! - **States**: passive holders of one event handler, shared as [`StateRef`]
//! - **Dispatch**: current state first, parent state only if the current one ignored the event
//! - **Handshake**: `transition_to` raises EXIT; the exiting state calls
//!   `complete_transition` to commit the switch and raise ENTRY
//! - **Delivery**: a [`Transport`] for mailbox hosts, a [`SignalPort`] otherwise
//!
//! # Threading
//!
//! [`StateMachine`] and [`State`] are `!Send` and must stay on the context
//! that calls [`StateMachine::run`]. [`Raiser`] is `Send + Sync` and is the
//! only way in from other contexts.

mod error;
mod machine;
mod raise;
mod state;
mod transport;

pub use error::{RaiseError, TransitionError};
pub use machine::{same_state, MachineId, StateMachine};
pub use raise::{Raised, Raiser};
pub use state::{EventHandler, State, StateEvent, StateRef, StateResult};
pub use transport::{ContextId, Origin, PostFn, RawEvent, SignalPort, Transport};
