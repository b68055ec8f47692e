//! Reference host collaborators.
//!
//! The engine only needs a [`Transport`](crate::engine::Transport) or a
//! [`SignalPort`](crate::engine::SignalPort). These are small std-only
//! implementations of both, good enough for tests, demos and threaded hosts
//! that have no queue of their own.

mod mailbox;
mod signals;

pub use mailbox::{mailbox, Mailbox, MailboxSender};
pub use signals::SignalBoard;
