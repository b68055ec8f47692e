//! Event origination.
//!
//! [`Raiser`] is the one piece of the engine that may be used from any
//! execution context. It never dispatches; it only sets a signal bit or
//! posts an envelope, so the owning context picks the event up on its next
//! wait.

use crate::core::{Envelope, EventCode, MsgAllocator, MsgId, OwnedMsg, Payload, Sentinel};
use crate::engine::error::RaiseError;
use crate::engine::transport::{ContextId, SignalPort, Transport};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Outcome of a successful raise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Raised {
    /// The event bit was set on `target`'s signal word.
    Signalled { target: ContextId },
    /// A static sentinel was posted. The caller owns nothing.
    Sentinel(Sentinel),
    /// An owned envelope was posted. The queue owns it until dispatch
    /// releases it.
    Posted(MsgId),
}

/// Cloneable, thread-safe handle for raising events at a machine.
///
/// Every clone shares the machine's transport slot, so
/// [`StateMachine::attach_transport`](crate::engine::StateMachine::attach_transport)
/// takes effect for raisers handed out earlier too. The signal port,
/// allocator and event catalog are fixed at build time.
#[derive(Clone)]
pub struct Raiser {
    transport: Arc<RwLock<Option<Arc<dyn Transport>>>>,
    signals: Option<Arc<dyn SignalPort>>,
    allocator: Arc<dyn MsgAllocator>,
    catalog: Option<Arc<[EventCode]>>,
}

impl Raiser {
    pub(crate) fn new(
        transport: Option<Arc<dyn Transport>>,
        signals: Option<Arc<dyn SignalPort>>,
        allocator: Arc<dyn MsgAllocator>,
        catalog: Option<Arc<[EventCode]>>,
    ) -> Self {
        Self {
            transport: Arc::new(RwLock::new(transport)),
            signals,
            allocator,
            catalog,
        }
    }

    pub(crate) fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transport;
    }

    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when events travel as signal bits.
    pub fn is_signal_mode(&self) -> bool {
        self.transport().is_none()
    }

    /// Raise `code` at `target` (the calling context when `None`).
    ///
    /// - Signal mode: sets the event bit; `code` must be a single bit.
    /// - Transport mode, sentinel code: posts the static sentinel.
    /// - Transport mode, user code: allocates an envelope and posts it. If
    ///   the transport rejects it, the envelope is released before the error
    ///   is returned. `target` is not used; the transport decides where the
    ///   envelope goes.
    pub fn raise_event(
        &self,
        code: EventCode,
        target: Option<ContextId>,
    ) -> Result<Raised, RaiseError> {
        self.deliver(code, None, target)
    }

    /// Like [`raise_event`](Self::raise_event) with `payload` attached to the
    /// envelope before it is posted.
    ///
    /// Only user codes in transport mode can carry a payload. On any error
    /// the payload is dropped.
    pub fn raise_with_payload<T: Any + Send>(
        &self,
        code: EventCode,
        payload: T,
        target: Option<ContextId>,
    ) -> Result<Raised, RaiseError> {
        self.deliver(code, Some(Box::new(payload)), target)
    }

    fn deliver(
        &self,
        code: EventCode,
        payload: Option<Payload>,
        target: Option<ContextId>,
    ) -> Result<Raised, RaiseError> {
        let sentinel = Sentinel::from_code(code);
        if code.is_reserved() && sentinel.is_none() {
            return Err(RaiseError::ReservedCode { code });
        }
        if sentinel.is_none() && !self.is_declared(code) {
            return Err(RaiseError::Undeclared { code });
        }

        // The lock is not held while posting.
        match (self.transport(), sentinel) {
            (None, _) => {
                if payload.is_some() {
                    return Err(RaiseError::PayloadUnsupported { code });
                }
                self.signal(code, target)
            }
            (Some(transport), Some(sentinel)) => {
                if payload.is_some() {
                    return Err(RaiseError::PayloadUnsupported { code });
                }
                transport
                    .post(Envelope::Sentinel(sentinel))
                    .map_err(|_| {
                        warn!(code = %code, "transport rejected sentinel");
                        RaiseError::Post { code }
                    })?;
                debug!(code = %code, "sentinel posted");
                Ok(Raised::Sentinel(sentinel))
            }
            (Some(transport), None) => self.post_owned(transport.as_ref(), code, payload),
        }
    }

    fn is_declared(&self, code: EventCode) -> bool {
        self.catalog
            .as_ref()
            .is_none_or(|catalog| catalog.contains(&code))
    }

    fn signal(&self, code: EventCode, target: Option<ContextId>) -> Result<Raised, RaiseError> {
        let Some(port) = &self.signals else {
            return Err(RaiseError::NoDeliveryPath { code });
        };
        if !code.is_single_bit() {
            return Err(RaiseError::NotASignal { code });
        }
        let target = target.unwrap_or_else(|| port.current_context());
        port.set(target, code);
        debug!(code = %code, ?target, "signal raised");
        Ok(Raised::Signalled { target })
    }

    fn post_owned(
        &self,
        transport: &dyn Transport,
        code: EventCode,
        payload: Option<Payload>,
    ) -> Result<Raised, RaiseError> {
        let owned = OwnedMsg::allocate(&self.allocator, code, payload).map_err(|source| {
            warn!(code = %code, error = %source, "envelope allocation failed");
            RaiseError::Allocation { code, source }
        })?;
        let id = owned.id();

        match transport.post(Envelope::Owned(owned)) {
            Ok(()) => {
                debug!(code = %code, %id, "envelope posted");
                Ok(Raised::Posted(id))
            }
            Err(rejected) => {
                // Releases the reservation taken above.
                drop(rejected);
                warn!(code = %code, %id, "transport rejected envelope");
                Err(RaiseError::Post { code })
            }
        }
    }
}

impl fmt::Debug for Raiser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raiser")
            .field("signal_mode", &self.is_signal_mode())
            .field("has_signal_port", &self.signals.is_some())
            .field("catalog", &self.catalog)
            .finish()
    }
}
