//! States and the events handed to them.
//!
//! A [`State`] is passive: it stores one replaceable handler and nothing
//! else. The application owns its states (as [`StateRef`]s) and hands
//! clones of them to the machine.

use crate::core::{EventCode, Msg, MsgId};
use crate::engine::machine::StateMachine;
use crate::engine::transport::Origin;
use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Shared handle to an application-owned state.
pub type StateRef = Rc<State>;

/// Event handler installed on a state.
///
/// The machine is passed in so a handler can request or complete a
/// transition, raise events, or change the parent state.
pub type EventHandler = Box<dyn FnMut(&mut StateEvent<'_>, &mut StateMachine) -> StateResult>;

/// What a handler did with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateResult {
    /// Consumed; the parent is not consulted.
    Handled,
    /// Not applicable; the parent (if any) gets the same event.
    Ignored,
    /// Consumed and a transition was requested; the parent is not consulted.
    Transition,
}

/// Event as seen by a handler.
///
/// Events that arrived as owned envelopes expose the message and its
/// payload. The payload still belongs to the envelope unless a handler
/// takes it with [`take_payload`](Self::take_payload).
pub struct StateEvent<'a> {
    code: EventCode,
    origin: Origin,
    msg: Option<&'a mut Msg>,
}

impl StateEvent<'static> {
    /// Event with no message attached.
    pub fn new(code: EventCode, origin: Origin) -> Self {
        Self {
            code,
            origin,
            msg: None,
        }
    }
}

impl<'a> StateEvent<'a> {
    pub(crate) fn with_msg(msg: &'a mut Msg) -> Self {
        Self {
            code: msg.code(),
            origin: Origin::Message,
            msg: Some(msg),
        }
    }

    pub fn code(&self) -> EventCode {
        self.code
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is(&self, code: EventCode) -> bool {
        self.code == code
    }

    /// Id of the owned envelope, `None` for sentinels, timeouts and signals.
    pub fn msg_id(&self) -> Option<MsgId> {
        self.msg.as_deref().map(Msg::id)
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.msg.as_deref()?.payload::<T>()
    }

    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.msg.as_deref_mut()?.payload_mut::<T>()
    }

    /// Take ownership of the payload. The parent, if consulted afterwards,
    /// sees no payload.
    pub fn take_payload<T: Any>(&mut self) -> Option<Box<T>> {
        self.msg.as_deref_mut()?.take_payload::<T>()
    }
}

impl fmt::Debug for StateEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEvent")
            .field("code", &self.code)
            .field("origin", &self.origin)
            .field("msg", &self.msg)
            .finish()
    }
}

/// A state: a name for diagnostics plus one event handler.
///
/// The default handler ignores everything.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use hsm_dispatch::core::EventCode;
/// use hsm_dispatch::engine::{State, StateResult};
///
/// let idle = Rc::new(State::with_handler("Idle", |event, _machine| {
///     if event.is(EventCode::ENTRY) {
///         StateResult::Handled
///     } else {
///         StateResult::Ignored
///     }
/// }));
/// assert_eq!(idle.name(), "Idle");
/// ```
pub struct State {
    name: Cow<'static, str>,
    // `None` only while the handler is running.
    handler: RefCell<Option<EventHandler>>,
}

impl State {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            handler: RefCell::new(Some(Box::new(ignore_all))),
        }
    }

    pub fn with_handler<F>(name: impl Into<Cow<'static, str>>, handler: F) -> Self
    where
        F: FnMut(&mut StateEvent<'_>, &mut StateMachine) -> StateResult + 'static,
    {
        let state = Self::new(name);
        state.set_handler(handler);
        state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install `handler`, replacing the previous one.
    ///
    /// May be called from inside this state's own handler; the new handler
    /// is used from the next event on.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(&mut StateEvent<'_>, &mut StateMachine) -> StateResult + 'static,
    {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Go back to the default handler.
    pub fn reset_handler(&self) {
        *self.handler.borrow_mut() = Some(Box::new(ignore_all));
    }

    /// Invoke the installed handler.
    ///
    /// A nested call while this state's handler is already running returns
    /// [`StateResult::Ignored`].
    ///
    /// # Panics
    ///
    /// A panic in the handler propagates. The handler is not put back, so
    /// after catching such a panic the state ignores every event until
    /// [`set_handler`](Self::set_handler) or
    /// [`reset_handler`](Self::reset_handler) installs a new one.
    pub fn handle(&self, event: &mut StateEvent<'_>, machine: &mut StateMachine) -> StateResult {
        let taken = self.handler.borrow_mut().take();
        let Some(mut handler) = taken else {
            trace!(state = %self.name, code = %event.code(), "nested dispatch ignored");
            return StateResult::Ignored;
        };
        let result = handler(event, machine);

        let mut slot = self.handler.borrow_mut();
        if slot.is_none() {
            *slot = Some(handler);
        }
        result
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").field("name", &self.name).finish()
    }
}

fn ignore_all(_event: &mut StateEvent<'_>, _machine: &mut StateMachine) -> StateResult {
    StateResult::Ignored
}
