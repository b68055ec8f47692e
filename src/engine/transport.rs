//! Boundary between the engine and its host.
//!
//! The host supplies two capabilities: a [`Transport`] that hands envelopes
//! to a mailbox, and a [`SignalPort`] that sets bits on an execution
//! context's signal word. Whatever waits on those (a queue receive with a
//! timeout, a signal wait) turns the result into a [`RawEvent`] and feeds it
//! to [`StateMachine::run`](crate::engine::StateMachine::run).

use crate::core::{Envelope, EventCode, SignalSet};
use std::fmt;
use std::thread::{self, ThreadId};

/// Capability that posts an envelope to a mailbox or queue.
///
/// Must be callable from any execution context. A rejected envelope is
/// handed back so the engine can release it.
pub trait Transport: Send + Sync {
    fn post(&self, envelope: Envelope) -> Result<(), Envelope>;
}

/// Adapts a closure into a [`Transport`].
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
/// use std::sync::{Arc, Mutex};
/// use hsm_dispatch::core::Envelope;
/// use hsm_dispatch::engine::{PostFn, Transport};
///
/// let (tx, rx) = mpsc::channel::<Envelope>();
/// let tx = Mutex::new(tx);
/// let transport = PostFn(move |envelope: Envelope| {
///     match tx.lock() {
///         Ok(tx) => tx.send(envelope).map_err(|e| e.0),
///         Err(_) => Err(envelope),
///     }
/// });
///
/// assert!(transport.post(Envelope::ENTRY).is_ok());
/// assert!(rx.try_recv().unwrap().is_sentinel());
/// ```
pub struct PostFn<F>(pub F);

impl<F> Transport for PostFn<F>
where
    F: Fn(Envelope) -> Result<(), Envelope> + Send + Sync,
{
    fn post(&self, envelope: Envelope) -> Result<(), Envelope> {
        (self.0)(envelope)
    }
}

impl<F> fmt::Debug for PostFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PostFn")
    }
}

/// Opaque handle naming an execution context (a thread on std hosts).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(ThreadId);

impl ContextId {
    /// The calling context.
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

impl From<ThreadId> for ContextId {
    fn from(id: ThreadId) -> Self {
        Self(id)
    }
}

/// Capability that sets event bits on a context's signal word.
///
/// Must be callable from any execution context.
pub trait SignalPort: Send + Sync {
    /// Context targeted when the caller does not name one.
    fn current_context(&self) -> ContextId {
        ContextId::current()
    }

    /// OR `code` into the signal word of `target`.
    fn set(&self, target: ContextId, code: EventCode);
}

/// Where an event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Timeout,
    Message,
    Signal,
}

/// What the host's wait primitive produced.
#[derive(Debug)]
pub enum RawEvent {
    /// The wait timed out.
    Timeout,
    /// An envelope was received from the mailbox.
    Message(Envelope),
    /// One or more signal bits were pending.
    Signals(SignalSet),
}

impl RawEvent {
    pub fn origin(&self) -> Origin {
        match self {
            RawEvent::Timeout => Origin::Timeout,
            RawEvent::Message(_) => Origin::Message,
            RawEvent::Signals(_) => Origin::Signal,
        }
    }
}

impl From<Envelope> for RawEvent {
    fn from(envelope: Envelope) -> Self {
        RawEvent::Message(envelope)
    }
}

impl From<SignalSet> for RawEvent {
    fn from(set: SignalSet) -> Self {
        RawEvent::Signals(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_fn_hands_back_rejected_envelopes() {
        let transport = PostFn(|envelope: Envelope| -> Result<(), Envelope> { Err(envelope) });
        let rejected = transport.post(Envelope::TIMED).unwrap_err();
        assert_eq!(rejected.code(), EventCode::TIMED);
    }

    #[test]
    fn context_ids_differ_across_threads() {
        let here = ContextId::current();
        let there = thread::spawn(ContextId::current).join().unwrap();
        assert_ne!(here, there);
        assert_eq!(here, ContextId::current());
    }

    #[test]
    fn raw_event_reports_origin() {
        assert_eq!(RawEvent::Timeout.origin(), Origin::Timeout);
        assert_eq!(RawEvent::from(Envelope::ENTRY).origin(), Origin::Message);
        assert_eq!(
            RawEvent::from(SignalSet::new(1)).origin(),
            Origin::Signal
        );
    }
}
