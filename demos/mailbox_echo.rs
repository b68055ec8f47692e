//! Mailbox Echo
//!
//! This example runs one state over a bounded mailbox and walks it through
//! every kind of event the engine knows about.
//!
//! Key concepts:
//! - ENTRY arms a receive timeout, which comes back as TIMED
//! - A ticker thread raises EVENT_0 through a `Raiser`
//! - Another thread allocates an envelope with a payload and posts it directly
//! - EVENT_1 reads the payload and re-enters the same state
//! - Envelope accounting through a `BoundedAllocator`
//!
//! Run with: RUST_LOG=debug cargo run --example mailbox_echo

use hsm_dispatch::core::{BoundedAllocator, MsgAllocator, Payload};
use hsm_dispatch::{
    mailbox, user_events, Envelope, EventCode, State, StateMachine, StateResult, Transport,
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

user_events! {
    struct Echo {
        EVENT_0,
        EVENT_1,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Mailbox Echo ===\n");

    let heap = Arc::new(BoundedAllocator::new(6));
    let allocator: Arc<dyn MsgAllocator> = heap.clone();
    let (sender, inbox) = mailbox(6);
    let mut sm = StateMachine::builder()
        .name("echo")
        .transport(Arc::new(sender.clone()))
        .allocator(Arc::clone(&allocator))
        .user_events(Echo::ALL)
        .build()?;

    let timeout: Rc<Cell<Option<Duration>>> = Rc::default();
    let rounds = Rc::new(Cell::new(0u32));
    let test = Rc::new(State::new("Test"));
    let me = Rc::downgrade(&test);
    let raiser = sm.raiser();

    {
        let (timeout, rounds) = (Rc::clone(&timeout), Rc::clone(&rounds));
        test.set_handler(move |event, sm| {
            let code = event.code();
            if code == EventCode::ENTRY {
                rounds.set(rounds.get() + 1);
                println!("ENTRY (round {}), waiting 1s", rounds.get());
                timeout.set(Some(Duration::from_secs(1)));
                StateResult::Handled
            } else if code == EventCode::TIMED {
                println!("TIMED, EVENT_0 in 2s");
                timeout.set(None);
                let raiser = raiser.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(2));
                    if let Err(err) = raiser.raise_event(Echo::EVENT_0, None) {
                        eprintln!("EVENT_0 lost: {err}");
                    }
                });
                StateResult::Handled
            } else if code == Echo::EVENT_0 {
                if let Some(id) = event.msg_id() {
                    println!("EVENT_0 ({id}), EVENT_1 in 1s");
                }
                let (sender, allocator) = (sender.clone(), Arc::clone(&allocator));
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(1));
                    let greeting: Payload = Box::new(String::from("Hello!!"));
                    match Envelope::allocate(&allocator, Echo::EVENT_1, Some(greeting)) {
                        Ok(envelope) => {
                            if sender.post(envelope).is_err() {
                                eprintln!("mailbox full, EVENT_1 dropped");
                            }
                        }
                        Err(err) => eprintln!("EVENT_1 lost: {err}"),
                    }
                });
                StateResult::Handled
            } else if code == Echo::EVENT_1 {
                let text = event.payload::<String>().map_or("<none>", String::as_str);
                println!("EVENT_1 received {text:?}, re-entering");
                match me.upgrade().map(|me| sm.transition_to(me, None)) {
                    Some(Ok(())) => StateResult::Transition,
                    Some(Err(err)) => {
                        eprintln!("re-entry refused: {err}");
                        StateResult::Handled
                    }
                    None => StateResult::Ignored,
                }
            } else if code == EventCode::EXIT {
                println!("EXIT");
                if let Err(err) = sm.complete_transition() {
                    eprintln!("ENTRY lost: {err}");
                }
                StateResult::Handled
            } else {
                StateResult::Ignored
            }
        });
    }

    sm.init_state(Rc::clone(&test), None)?;

    while rounds.get() < 3 {
        let Some(raw) = inbox.wait(timeout.get()) else {
            break;
        };
        sm.run(raw);
    }

    println!(
        "\nEnvelopes: {} allocated, {} released, {} outstanding",
        heap.allocations(),
        heap.releases(),
        heap.outstanding()
    );
    Ok(())
}
