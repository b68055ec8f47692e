//! Bounded in-process mailbox.

use crate::core::Envelope;
use crate::engine::{RawEvent, Transport};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

/// Create a mailbox holding at most `capacity` envelopes (at least one).
///
/// The sender is the machine's [`Transport`]; the receiver stays with the
/// loop that calls [`StateMachine::run`](crate::engine::StateMachine::run).
pub fn mailbox(capacity: usize) -> (MailboxSender, Mailbox) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (MailboxSender { tx }, Mailbox { rx })
}

/// Posting half. Never blocks: a full or closed mailbox hands the envelope
/// back to the caller.
#[derive(Clone, Debug)]
pub struct MailboxSender {
    tx: SyncSender<Envelope>,
}

impl Transport for MailboxSender {
    fn post(&self, envelope: Envelope) -> Result<(), Envelope> {
        self.tx.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(envelope) | TrySendError::Disconnected(envelope) => envelope,
        })
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct Mailbox {
    rx: Receiver<Envelope>,
}

impl Mailbox {
    /// Wait for the next envelope.
    ///
    /// `None` for `timeout` waits forever. An elapsed timeout yields
    /// [`RawEvent::Timeout`]; `None` is returned once every sender is gone
    /// and the mailbox is empty.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<RawEvent> {
        match timeout {
            None => self.rx.recv().ok().map(RawEvent::Message),
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(envelope) => Some(RawEvent::Message(envelope)),
                Err(RecvTimeoutError::Timeout) => Some(RawEvent::Timeout),
                Err(RecvTimeoutError::Disconnected) => None,
            },
        }
    }

    /// Next envelope if one is already queued.
    pub fn try_next(&self) -> Option<RawEvent> {
        self.rx.try_recv().ok().map(RawEvent::Message)
    }

    /// Every envelope currently queued, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = RawEvent> + '_ {
        std::iter::from_fn(move || self.try_next())
    }
}
