//! In-process signal words.

use crate::core::{EventCode, SignalSet};
use crate::engine::{ContextId, RawEvent, SignalPort};
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One signal word per execution context, with a blocking wait.
///
/// Setting a bit wakes every waiter; a waiter consumes the whole word of its
/// own context at once.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use hsm_dispatch::core::EventCode;
/// use hsm_dispatch::engine::{ContextId, RawEvent, SignalPort};
/// use hsm_dispatch::host::SignalBoard;
///
/// let board = SignalBoard::new();
/// let here = ContextId::current();
///
/// board.set(here, EventCode::ENTRY);
/// match board.wait(here, Some(Duration::from_millis(10))) {
///     RawEvent::Signals(set) => assert!(set.contains(EventCode::ENTRY)),
///     other => panic!("unexpected {other:?}"),
/// }
/// assert!(matches!(board.wait(here, Some(Duration::ZERO)), RawEvent::Timeout));
/// ```
#[derive(Debug, Default)]
pub struct SignalBoard {
    words: Mutex<HashMap<ContextId, u32>>,
    raised: Condvar,
}

impl SignalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume and return every pending bit of `context`.
    pub fn take(&self, context: ContextId) -> SignalSet {
        SignalSet::new(self.lock().remove(&context).unwrap_or(0))
    }

    /// Pending bits of `context`, left in place.
    pub fn peek(&self, context: ContextId) -> SignalSet {
        SignalSet::new(self.lock().get(&context).copied().unwrap_or(0))
    }

    /// Block until `context` has pending bits or `timeout` elapses.
    ///
    /// `None` waits forever. Returns [`RawEvent::Signals`] with every bit
    /// that was pending, or [`RawEvent::Timeout`].
    pub fn wait(&self, context: ContextId, timeout: Option<Duration>) -> RawEvent {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut words = self.lock();
        loop {
            // A context's word only exists while it has pending bits.
            if let Some(bits) = words.remove(&context) {
                return RawEvent::Signals(SignalSet::new(bits));
            }
            match deadline {
                None => {
                    words = self
                        .raised
                        .wait(words)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return RawEvent::Timeout;
                    }
                    let (guard, _) = self
                        .raised
                        .wait_timeout(words, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    words = guard;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextId, u32>> {
        self.words.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalPort for SignalBoard {
    fn set(&self, target: ContextId, code: EventCode) {
        if code.raw() == 0 {
            return;
        }
        *self.lock().entry(target).or_insert(0) |= code.raw();
        self.raised.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_bits_accumulate_until_taken() {
        let board = SignalBoard::new();
        let here = ContextId::current();
        board.set(here, EventCode::ENTRY);
        board.set(here, EventCode::user_flag(0));
        board.set(here, EventCode::ENTRY);

        assert_eq!(board.peek(here).bits(), 0b1_0001);
        assert_eq!(board.take(here).bits(), 0b1_0001);
        assert!(board.take(here).is_empty());
    }

    #[test]
    fn contexts_have_separate_words() {
        let board = SignalBoard::new();
        let here = ContextId::current();
        let other = thread::spawn(ContextId::current).join().unwrap();

        board.set(other, EventCode::TIMED);
        assert!(board.take(here).is_empty());
        assert_eq!(board.take(other).bits(), EventCode::TIMED.raw());
    }

    #[test]
    fn consumed_words_are_forgotten() {
        let board = Arc::new(SignalBoard::new());
        let workers: Vec<ContextId> = (0..4)
            .map(|_| thread::spawn(ContextId::current).join().unwrap())
            .collect();

        for &worker in &workers {
            board.set(worker, EventCode::user_flag(1));
        }
        assert_eq!(board.lock().len(), 4);

        board.take(workers[0]);
        assert!(matches!(
            board.wait(workers[1], Some(Duration::ZERO)),
            RawEvent::Signals(_)
        ));
        assert_eq!(board.lock().len(), 2);
        assert!(board.peek(workers[0]).is_empty());
    }

    #[test]
    fn wait_times_out_with_nothing_pending() {
        let board = SignalBoard::new();
        let started = Instant::now();
        let event = board.wait(ContextId::current(), Some(Duration::from_millis(20)));
        assert!(matches!(event, RawEvent::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_wakes_when_another_thread_sets_a_bit() {
        let board = Arc::new(SignalBoard::new());
        let here = ContextId::current();

        let producer = {
            let board = Arc::clone(&board);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                board.set(here, EventCode::user_flag(4));
            })
        };

        let event = board.wait(here, Some(Duration::from_secs(5)));
        producer.join().unwrap();
        match event {
            RawEvent::Signals(set) => assert!(set.contains(EventCode::user_flag(4))),
            other => panic!("expected signals, got {other:?}"),
        }
    }
}
