//! The dispatch engine.

use crate::builder::MachineBuilder;
use crate::core::{
    EventCode, SignalSet, SystemAllocator, TransitionHistory, TransitionKind, TransitionRecord,
};
use crate::engine::error::{RaiseError, TransitionError};
use crate::engine::raise::{Raised, Raiser};
use crate::engine::state::{StateEvent, StateRef, StateResult};
use crate::engine::transport::{ContextId, Origin, RawEvent, SignalPort, Transport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Unique identity of a machine instance, used to tell instances apart in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(Uuid);

impl MachineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Pending {
    state: StateRef,
    target: Option<ContextId>,
}

/// Hierarchical state machine with one current and one fallback state.
///
/// The machine is driven from a single execution context: a loop that
/// waits on the host's mailbox or signal word and feeds each result into
/// [`run`](Self::run). Other contexts reach it only through a
/// [`Raiser`].
///
/// # Transition handshake
///
/// [`transition_to`](Self::transition_to) does not switch states. It
/// records the target and raises EXIT to the current state. The switch is
/// committed when [`complete_transition`](Self::complete_transition) is
/// called, normally by the current state's EXIT handler once its cleanup is
/// done. **If the EXIT handler never calls it, the machine stays in the old
/// state with the transition pending, and every further `transition_to` is
/// rejected.**
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use std::sync::Arc;
/// use hsm_dispatch::core::EventCode;
/// use hsm_dispatch::host::mailbox;
/// use hsm_dispatch::engine::{State, StateMachine, StateResult};
///
/// let (sender, inbox) = mailbox(8);
/// let mut sm = StateMachine::with_transport(Arc::new(sender));
///
/// let done = Rc::new(State::with_handler("Done", |_, _| StateResult::Handled));
/// let target = Rc::clone(&done);
/// let idle = Rc::new(State::with_handler("Idle", move |event, sm| {
///     match event.code() {
///         EventCode::ENTRY => {
///             let _ = sm.transition_to(Rc::clone(&target), None);
///             StateResult::Transition
///         }
///         EventCode::EXIT => {
///             let _ = sm.complete_transition();
///             StateResult::Handled
///         }
///         _ => StateResult::Ignored,
///     }
/// }));
///
/// sm.init_state(idle, None).unwrap();
/// while let Some(raw) = inbox.try_next() {
///     sm.run(raw);
/// }
/// assert_eq!(sm.current().map(|s| s.name()), Some("Done"));
/// ```
pub struct StateMachine {
    id: MachineId,
    name: Cow<'static, str>,
    current: Option<StateRef>,
    pending: Option<Pending>,
    parent: Option<StateRef>,
    raiser: Raiser,
    history: TransitionHistory,
}

impl StateMachine {
    /// Machine that delivers events as signal bits through `signals`.
    pub fn with_signals(signals: Arc<dyn SignalPort>) -> Self {
        Self::from_parts(
            Cow::Borrowed("machine"),
            Raiser::new(None, Some(signals), Arc::new(SystemAllocator), None),
            None,
            TransitionHistory::default(),
        )
    }

    /// Machine that posts events through `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::from_parts(
            Cow::Borrowed("machine"),
            Raiser::new(Some(transport), None, Arc::new(SystemAllocator), None),
            None,
            TransitionHistory::default(),
        )
    }

    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    pub(crate) fn from_parts(
        name: Cow<'static, str>,
        raiser: Raiser,
        parent: Option<StateRef>,
        history: TransitionHistory,
    ) -> Self {
        let machine = Self {
            id: MachineId::new(),
            name,
            current: None,
            pending: None,
            parent,
            raiser,
            history,
        };
        info!(
            machine = %machine.id,
            name = %machine.name,
            signal_mode = machine.raiser.is_signal_mode(),
            "state machine created"
        );
        machine
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> Option<&StateRef> {
        self.current.as_ref()
    }

    /// Target of the transition waiting for `complete_transition`.
    pub fn pending(&self) -> Option<&StateRef> {
        self.pending.as_ref().map(|p| &p.state)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn parent(&self) -> Option<&StateRef> {
        self.parent.as_ref()
    }

    pub fn is_signal_mode(&self) -> bool {
        self.raiser.is_signal_mode()
    }

    pub fn history(&self) -> &TransitionHistory {
        &self.history
    }

    /// Handle for raising events at this machine from other contexts.
    /// It follows later [`attach_transport`](Self::attach_transport) calls.
    pub fn raiser(&self) -> Raiser {
        self.raiser.clone()
    }

    /// Install or clear the mailbox transport. Without one the machine and
    /// every raiser it handed out deliver events as signal bits.
    pub fn attach_transport(&mut self, transport: Option<Arc<dyn Transport>>) {
        self.raiser.set_transport(transport);
        debug!(
            machine = %self.id,
            signal_mode = self.raiser.is_signal_mode(),
            "delivery path changed"
        );
    }

    /// Install or clear the fallback state. Applies from the next event.
    pub fn set_parent(&mut self, parent: Option<StateRef>) {
        self.parent = parent;
    }

    /// Cold start (or hard reset) into `state` and raise ENTRY at `target`.
    ///
    /// The state is current even if ENTRY could not be delivered.
    pub fn init_state(
        &mut self,
        state: StateRef,
        target: Option<ContextId>,
    ) -> Result<(), RaiseError> {
        let from = self.current.take().map(|s| s.name().to_string());
        self.pending = None;
        self.commit(TransitionKind::Init, from, state);
        self.raiser.raise_event(EventCode::ENTRY, target).map(|_| ())
    }

    /// Request a change to `state`.
    ///
    /// On an idle machine this is [`init_state`](Self::init_state).
    /// Otherwise `state` becomes pending and EXIT is raised to the current
    /// state; nothing switches until [`complete_transition`](Self::complete_transition).
    /// A second request while one is pending is rejected and the original
    /// target is kept. If EXIT cannot be delivered the request is dropped.
    pub fn transition_to(
        &mut self,
        state: StateRef,
        target: Option<ContextId>,
    ) -> Result<(), TransitionError> {
        let Some(current) = self.current.as_ref() else {
            return self.init_state(state, target).map_err(TransitionError::from);
        };

        if let Some(pending) = &self.pending {
            warn!(
                machine = %self.id,
                current = current.name(),
                pending = pending.state.name(),
                requested = state.name(),
                "transition already pending"
            );
            return Err(TransitionError::AlreadyPending {
                current: current.name().to_string(),
                pending: pending.state.name().to_string(),
            });
        }

        debug!(
            machine = %self.id,
            from = current.name(),
            to = state.name(),
            "transition requested"
        );
        self.pending = Some(Pending { state, target });
        if let Err(err) = self.raiser.raise_event(EventCode::EXIT, target) {
            self.pending = None;
            return Err(err.into());
        }
        Ok(())
    }

    /// Commit the pending transition: the target becomes current and ENTRY
    /// is raised at the context the EXIT went to.
    ///
    /// Returns `Ok(false)` when nothing is pending. The switch is committed
    /// even if ENTRY could not be delivered.
    pub fn complete_transition(&mut self) -> Result<bool, RaiseError> {
        let Some(Pending { state, target }) = self.pending.take() else {
            return Ok(false);
        };
        let from = self.current.take().map(|s| s.name().to_string());
        self.commit(TransitionKind::Transition, from, state);
        self.raiser.raise_event(EventCode::ENTRY, target)?;
        Ok(true)
    }

    pub fn raise_event(
        &self,
        code: EventCode,
        target: Option<ContextId>,
    ) -> Result<Raised, RaiseError> {
        self.raiser.raise_event(code, target)
    }

    pub fn raise_with_payload<T: Any + Send>(
        &self,
        code: EventCode,
        payload: T,
        target: Option<ContextId>,
    ) -> Result<Raised, RaiseError> {
        self.raiser.raise_with_payload(code, payload, target)
    }

    /// Normalize one raw event and dispatch it.
    ///
    /// - `Timeout`: dispatches TIMED.
    /// - `Message`: dispatches the envelope's code, then drops the envelope;
    ///   an owned one releases its payload and then itself.
    /// - `Signals`: dispatches one event per set bit, lowest bit first.
    pub fn run(&mut self, event: RawEvent) {
        match event {
            RawEvent::Timeout => {
                let mut event = StateEvent::new(EventCode::TIMED, Origin::Timeout);
                self.invoke_handler(&mut event);
            }
            RawEvent::Message(mut envelope) => {
                let code = envelope.code();
                match envelope.msg_mut() {
                    Some(msg) => self.invoke_handler(&mut StateEvent::with_msg(msg)),
                    None => self.invoke_handler(&mut StateEvent::new(code, Origin::Message)),
                }
            }
            RawEvent::Signals(set) => self.run_signals(set),
        }
    }

    fn run_signals(&mut self, set: SignalSet) {
        for code in set {
            let mut event = StateEvent::new(code, Origin::Signal);
            self.invoke_handler(&mut event);
        }
    }

    /// Current state first; the parent only if the current state ignored
    /// the event (or there is none). The parent's answer is final.
    fn invoke_handler(&mut self, event: &mut StateEvent<'_>) {
        if let Some(current) = self.current.clone() {
            let result = current.handle(event, self);
            debug!(
                machine = %self.id,
                state = current.name(),
                code = %event.code(),
                ?result,
                "event dispatched"
            );
            if result != StateResult::Ignored {
                return;
            }
        }

        let Some(parent) = self.parent.clone() else {
            trace!(machine = %self.id, code = %event.code(), "unhandled event dropped");
            return;
        };
        let result = parent.handle(event, self);
        debug!(
            machine = %self.id,
            parent = parent.name(),
            code = %event.code(),
            ?result,
            "event dispatched to parent"
        );
        if result == StateResult::Ignored {
            trace!(machine = %self.id, code = %event.code(), "unhandled event dropped");
        }
    }

    fn commit(&mut self, kind: TransitionKind, from: Option<String>, state: StateRef) {
        info!(
            machine = %self.id,
            from = from.as_deref().unwrap_or("-"),
            to = state.name(),
            ?kind,
            "state entered"
        );
        self.history.record(TransitionRecord {
            kind,
            from,
            to: state.name().to_string(),
            timestamp: Utc::now(),
        });
        self.current = Some(state);
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("current", &self.current.as_ref().map(|s| s.name()))
            .field("pending", &self.pending().map(|s| s.name()))
            .field("parent", &self.parent.as_ref().map(|s| s.name()))
            .field("raiser", &self.raiser)
            .finish()
    }
}

/// True when both handles point at the same state.
pub fn same_state(a: &StateRef, b: &StateRef) -> bool {
    Rc::ptr_eq(a, b)
}
