//! Signal Blinker
//!
//! This example drives a two-state LED blinker over signal bits.
//!
//! Key concepts:
//! - Signal-mode delivery through a `SignalBoard`
//! - A ticker thread raising events at the loop's context through a `Raiser`
//! - The EXIT/ENTRY handshake between `On` and `Off`
//! - A parent state catching STOP for whichever state is current
//!
//! Run with: RUST_LOG=debug cargo run --example signal_blinker

use hsm_dispatch::{
    user_events, ContextId, EventCode, RawEvent, SignalBoard, State, StateMachine, StateResult,
};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

user_events! {
    struct Led {
        TICK,
        STOP,
    }
}

/// Make `state` hand over to `next` on every TICK.
fn wire(state: &State, name: &'static str, next: Weak<State>) {
    state.set_handler(move |event, sm| match event.code() {
        code if code == Led::TICK => match next.upgrade() {
            Some(next) => match sm.transition_to(next, None) {
                Ok(()) => StateResult::Transition,
                Err(err) => {
                    println!("  {name}: {err}");
                    StateResult::Handled
                }
            },
            None => StateResult::Ignored,
        },
        EventCode::ENTRY => {
            println!("  lamp {name}");
            StateResult::Handled
        }
        EventCode::EXIT => {
            let _ = sm.complete_transition();
            StateResult::Handled
        }
        _ => StateResult::Ignored,
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Signal Blinker ===\n");

    let board = Arc::new(SignalBoard::new());
    let mut sm = StateMachine::builder()
        .name("blinker")
        .signals(board.clone())
        .user_events(Led::ALL)
        .build()?;

    // Off and On point at each other, so build both before installing handlers.
    let off = Rc::new(State::new("Off"));
    let on = Rc::new(State::new("On"));
    wire(&off, "Off", Rc::downgrade(&on));
    wire(&on, "On", Rc::downgrade(&off));
    let running = Rc::new(Cell::new(true));

    let flag = Rc::clone(&running);
    sm.set_parent(Some(Rc::new(State::with_handler("Root", move |event, _| {
        if event.is(Led::STOP) {
            println!("  STOP");
            flag.set(false);
            StateResult::Handled
        } else {
            StateResult::Ignored
        }
    }))));
    sm.init_state(Rc::clone(&off), None)?;

    let here = ContextId::current();
    let raiser = sm.raiser();
    let ticker = thread::spawn(move || {
        for _ in 0..6 {
            thread::sleep(Duration::from_millis(100));
            if raiser.raise_event(Led::TICK, Some(here)).is_err() {
                return;
            }
        }
        let _ = raiser.raise_event(Led::STOP, Some(here));
    });

    while running.get() {
        match board.wait(here, Some(Duration::from_secs(1))) {
            RawEvent::Timeout => {
                println!("  no tick for a second, giving up");
                break;
            }
            raw => sm.run(raw),
        }
    }
    let _ = ticker.join();

    println!("\nVisited: {}", sm.history().get_path().join(" -> "));
    Ok(())
}
