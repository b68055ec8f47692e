//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::builder::validation::validate_events;
use crate::core::{EventCode, MsgAllocator, SystemAllocator, TransitionHistory};
use crate::engine::{Raiser, SignalPort, StateMachine, StateRef, Transport};
use std::borrow::Cow;
use std::sync::Arc;
use stillwater::validation::Validation;

/// Builder for constructing state machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use hsm_dispatch::core::EventCode;
/// use hsm_dispatch::engine::StateMachine;
/// use hsm_dispatch::host::SignalBoard;
///
/// let board = Arc::new(SignalBoard::new());
/// let sm = StateMachine::builder()
///     .name("blinker")
///     .signals(board)
///     .user_events(&[EventCode::user_flag(0), EventCode::user_flag(1)])
///     .history_capacity(8)
///     .build()
///     .unwrap();
///
/// assert!(sm.is_signal_mode());
/// assert_eq!(sm.name(), "blinker");
/// ```
pub struct MachineBuilder {
    name: Cow<'static, str>,
    transport: Option<Arc<dyn Transport>>,
    signals: Option<Arc<dyn SignalPort>>,
    allocator: Option<Arc<dyn MsgAllocator>>,
    parent: Option<StateRef>,
    events: Vec<EventCode>,
    history_capacity: usize,
}

impl MachineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            name: Cow::Borrowed("machine"),
            transport: None,
            signals: None,
            allocator: None,
            parent: None,
            events: Vec::new(),
            history_capacity: TransitionHistory::DEFAULT_CAPACITY,
        }
    }

    /// Diagnostic name used in logs.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Deliver events through a mailbox transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Deliver events as signal bits. Also used after a later
    /// `attach_transport(None)`.
    pub fn signals(mut self, signals: Arc<dyn SignalPort>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Allocator for owned envelopes. Defaults to [`SystemAllocator`].
    pub fn allocator(mut self, allocator: Arc<dyn MsgAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn parent(mut self, parent: StateRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Declare the user events this machine accepts. Once any are
    /// declared, raising an undeclared user code fails.
    pub fn user_events(mut self, events: &[EventCode]) -> Self {
        self.events.extend_from_slice(events);
        self
    }

    /// Number of transitions kept in history. Zero disables recording.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Build the state machine.
    /// Returns an error if no delivery path is set or any declared event is
    /// invalid; all invalid events are reported at once.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        if self.transport.is_none() && self.signals.is_none() {
            return Err(BuildError::NoDeliveryPath);
        }

        let signal_mode = self.transport.is_none();
        if let Validation::Failure(errors) = validate_events(&self.events, signal_mode) {
            return Err(BuildError::InvalidEvents(errors.iter().copied().collect()));
        }

        let catalog: Option<Arc<[EventCode]>> = if self.events.is_empty() {
            None
        } else {
            Some(self.events.into())
        };
        let allocator = self
            .allocator
            .unwrap_or_else(|| Arc::new(SystemAllocator) as Arc<dyn MsgAllocator>);

        let raiser = Raiser::new(self.transport, self.signals, allocator, catalog);
        Ok(StateMachine::from_parts(
            self.name,
            raiser,
            self.parent,
            TransitionHistory::with_capacity(self.history_capacity),
        ))
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::error::EventViolation;
    use crate::core::{BoundedAllocator, Envelope};
    use crate::engine::{PostFn, RaiseError, State};
    use crate::host::{mailbox, SignalBoard};
    use std::rc::Rc;

    fn accept_all() -> Arc<dyn Transport> {
        Arc::new(PostFn(|_: Envelope| -> Result<(), Envelope> { Ok(()) }))
    }

    #[test]
    fn builder_requires_a_delivery_path() {
        let result = MachineBuilder::new().build();

        assert!(matches!(result, Err(BuildError::NoDeliveryPath)));
    }

    #[test]
    fn builder_reports_every_bad_event() {
        let result = MachineBuilder::new()
            .signals(Arc::new(SignalBoard::new()))
            .user_events(&[EventCode::TIMED, EventCode::sequential(5)])
            .build();

        match result {
            Err(BuildError::InvalidEvents(violations)) => {
                assert_eq!(violations.len(), 2);
                assert!(violations.contains(&EventViolation::Reserved {
                    code: EventCode::TIMED
                }));
                assert!(violations.contains(&EventViolation::NotSingleBit {
                    code: EventCode::sequential(5)
                }));
            }
            other => panic!("expected invalid events, got {other:?}"),
        }
    }

    #[test]
    fn transport_wins_over_signals() {
        let (sender, _inbox) = mailbox(4);
        let sm = MachineBuilder::new()
            .signals(Arc::new(SignalBoard::new()))
            .transport(Arc::new(sender))
            .user_events(&[EventCode::sequential(7)])
            .build()
            .unwrap();

        assert!(!sm.is_signal_mode());
    }

    #[test]
    fn fluent_api_builds_machine() {
        let parent: StateRef = Rc::new(State::new("Root"));
        let sm = MachineBuilder::new()
            .name("worker")
            .transport(accept_all())
            .parent(Rc::clone(&parent))
            .history_capacity(0)
            .build()
            .unwrap();

        assert_eq!(sm.name(), "worker");
        assert!(sm.current().is_none());
        assert!(sm.parent().is_some_and(|p| Rc::ptr_eq(p, &parent)));
        assert_eq!(sm.history().capacity(), 0);
    }

    #[test]
    fn declared_catalog_restricts_raises() {
        let sm = MachineBuilder::new()
            .transport(accept_all())
            .user_events(&[EventCode::user_flag(0)])
            .build()
            .unwrap();

        assert!(sm.raise_event(EventCode::user_flag(0), None).is_ok());
        assert!(sm.raise_event(EventCode::EXIT, None).is_ok());
        assert_eq!(
            sm.raise_event(EventCode::user_flag(1), None),
            Err(RaiseError::Undeclared {
                code: EventCode::user_flag(1)
            })
        );
    }

    #[test]
    fn custom_allocator_backs_envelopes() {
        let heap = Arc::new(BoundedAllocator::new(1));
        let sm = MachineBuilder::new()
            .transport(accept_all())
            .allocator(heap.clone())
            .build()
            .unwrap();

        sm.raise_event(EventCode::sequential(1), None).unwrap();
        assert_eq!(heap.allocations(), 1);
        assert_eq!(heap.outstanding(), 0);
    }
}
