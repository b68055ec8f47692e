//! End-to-end dispatch over the reference hosts.

use hsm_dispatch::core::{BoundedAllocator, Envelope, EventCode, MsgAllocator, Payload};
use hsm_dispatch::engine::{
    ContextId, RaiseError, RawEvent, State, StateMachine, StateResult, Transport,
};
use hsm_dispatch::host::{mailbox, SignalBoard};
use hsm_dispatch::user_events;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

user_events! {
    struct Demo {
        EVENT_0,
        EVENT_1,
    }
}

/// Entry arms a timeout, the timeout arms a tick that raises EVENT_0,
/// EVENT_0 arms a tick that posts EVENT_1 with a greeting, and EVENT_1
/// re-enters the same state.
#[test]
fn mailbox_host_runs_the_full_event_cycle() {
    let heap = Arc::new(BoundedAllocator::new(4));
    let allocator: Arc<dyn MsgAllocator> = heap.clone();
    let (sender, inbox) = mailbox(6);
    let mut sm = StateMachine::builder()
        .name("cycle")
        .transport(Arc::new(sender.clone()))
        .allocator(Arc::clone(&allocator))
        .user_events(Demo::ALL)
        .build()
        .unwrap();

    let timeout: Rc<Cell<Option<Duration>>> = Rc::default();
    let trace: Rc<RefCell<Vec<String>>> = Rc::default();
    let entries = Rc::new(Cell::new(0));

    let test_state = Rc::new(State::new("Test"));
    let me = Rc::downgrade(&test_state);
    let raiser = sm.raiser();
    {
        let (timeout, trace, entries) = (
            Rc::clone(&timeout),
            Rc::clone(&trace),
            Rc::clone(&entries),
        );
        test_state.set_handler(move |event, sm| {
            let code = event.code();
            if code == EventCode::ENTRY {
                trace.borrow_mut().push("ENTRY".into());
                entries.set(entries.get() + 1);
                timeout.set(Some(Duration::from_millis(20)));
                StateResult::Handled
            } else if code == EventCode::TIMED {
                trace.borrow_mut().push("TIMED".into());
                timeout.set(None);
                let raiser = raiser.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    raiser.raise_event(Demo::EVENT_0, None)
                });
                StateResult::Handled
            } else if code == Demo::EVENT_0 {
                trace.borrow_mut().push("EVENT_0".into());
                let (sender, allocator) = (sender.clone(), Arc::clone(&allocator));
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    let greeting: Payload = Box::new("Hello!!");
                    if let Ok(envelope) =
                        Envelope::allocate(&allocator, Demo::EVENT_1, Some(greeting))
                    {
                        let _ = sender.post(envelope);
                    }
                });
                StateResult::Handled
            } else if code == Demo::EVENT_1 {
                let text = event.payload::<&'static str>().copied().unwrap_or("<none>");
                trace.borrow_mut().push(format!("EVENT_1: {text}"));
                if let Some(me) = me.upgrade() {
                    sm.transition_to(me, None).unwrap();
                }
                StateResult::Transition
            } else if code == EventCode::EXIT {
                trace.borrow_mut().push("EXIT".into());
                sm.complete_transition().unwrap();
                StateResult::Handled
            } else {
                StateResult::Ignored
            }
        });
    }

    sm.init_state(Rc::clone(&test_state), None).unwrap();

    let mut steps = 0;
    while entries.get() < 2 && steps < 20 {
        let wait = timeout.get().unwrap_or(Duration::from_secs(5));
        let Some(raw) = inbox.wait(Some(wait)) else {
            break;
        };
        sm.run(raw);
        steps += 1;
    }

    assert_eq!(
        *trace.borrow(),
        vec!["ENTRY", "TIMED", "EVENT_0", "EVENT_1: Hello!!", "EXIT", "ENTRY"]
    );
    assert_eq!(sm.history().get_path(), vec!["Test", "Test"]);
    assert_eq!(heap.allocations(), 2);
    assert_eq!(heap.outstanding(), 0);
}

#[test]
fn signal_host_receives_raises_from_other_threads() {
    user_events! {
        struct Ctl {
            TOGGLE,
            STOP,
        }
    }

    let board = Arc::new(SignalBoard::new());
    let (handle_tx, handle_rx) = mpsc::channel();

    let worker_board = Arc::clone(&board);
    let worker = thread::spawn(move || {
        let mut sm = StateMachine::builder()
            .signals(worker_board.clone())
            .user_events(Ctl::ALL)
            .build()
            .unwrap();
        let toggles = Rc::new(Cell::new(0u32));
        let stopped = Rc::new(Cell::new(false));

        let (t, s) = (Rc::clone(&toggles), Rc::clone(&stopped));
        sm.init_state(
            Rc::new(State::with_handler("Run", move |event, _| {
                if event.is(Ctl::TOGGLE) {
                    t.set(t.get() + 1);
                    StateResult::Handled
                } else if event.is(Ctl::STOP) {
                    s.set(true);
                    StateResult::Handled
                } else {
                    StateResult::Ignored
                }
            })),
            None,
        )
        .unwrap();
        handle_tx.send((sm.raiser(), ContextId::current())).unwrap();

        let here = ContextId::current();
        while !stopped.get() {
            match worker_board.wait(here, Some(Duration::from_secs(5))) {
                RawEvent::Timeout => break,
                raw => sm.run(raw),
            }
        }
        (toggles.get(), stopped.get())
    });

    let (raiser, worker_context) = handle_rx.recv().unwrap();
    raiser.raise_event(Ctl::TOGGLE, Some(worker_context)).unwrap();
    raiser.raise_event(Ctl::STOP, Some(worker_context)).unwrap();

    // Bits may coalesce, but TOGGLE always dispatches before STOP.
    assert_eq!(worker.join().unwrap(), (1, true));
    assert!(board.take(ContextId::current()).is_empty());
}

#[test]
fn rejected_post_releases_the_envelope() {
    let heap = Arc::new(BoundedAllocator::new(8));
    let (sender, inbox) = mailbox(1);
    let sm = StateMachine::builder()
        .transport(Arc::new(sender))
        .allocator(heap.clone())
        .build()
        .unwrap();

    sm.raise_event(EventCode::sequential(1), None).unwrap();
    assert_eq!(heap.outstanding(), 1);

    let err = sm
        .raise_with_payload(EventCode::sequential(2), vec![1u8, 2, 3], None)
        .unwrap_err();
    assert_eq!(
        err,
        RaiseError::Post {
            code: EventCode::sequential(2)
        }
    );
    assert_eq!(heap.outstanding(), 1);
    assert_eq!(heap.releases(), 1);

    drop(inbox);
    drop(sm);
    assert_eq!(heap.outstanding(), 0);
}

#[test]
fn exhausted_allocator_recovers_after_dispatch() {
    let heap = Arc::new(BoundedAllocator::new(1));
    let (sender, inbox) = mailbox(8);
    let mut sm = StateMachine::builder()
        .transport(Arc::new(sender))
        .allocator(heap.clone())
        .build()
        .unwrap();
    sm.init_state(Rc::new(State::new("Idle")), None).unwrap();

    sm.raise_event(EventCode::sequential(1), None).unwrap();
    let err = sm.raise_event(EventCode::sequential(2), None).unwrap_err();
    assert!(matches!(err, RaiseError::Allocation { .. }));
    assert!(err.is_retryable());

    for raw in inbox.drain() {
        sm.run(raw);
    }
    assert_eq!(heap.outstanding(), 0);
    assert!(sm.raise_event(EventCode::sequential(2), None).is_ok());
}

#[test]
fn signal_mode_rejects_what_bits_cannot_carry() {
    let board = Arc::new(SignalBoard::new());
    let sm = StateMachine::with_signals(board);

    assert_eq!(
        sm.raise_event(EventCode::sequential(3), None),
        Err(RaiseError::NotASignal {
            code: EventCode::sequential(3)
        })
    );
    assert_eq!(
        sm.raise_with_payload(EventCode::user_flag(0), "data", None),
        Err(RaiseError::PayloadUnsupported {
            code: EventCode::user_flag(0)
        })
    );
    assert_eq!(
        sm.raise_event(EventCode::new(0b0110), None),
        Err(RaiseError::ReservedCode {
            code: EventCode::new(0b0110)
        })
    );
}
