//! Fixed-width signal word.
//!
//! In signal mode every pending event is one bit of a 32-bit word. The
//! engine consumes a word as a lazy sequence of single-bit events in
//! ascending bit order.

use super::event::EventCode;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use std::ops::{BitOr, BitOrAssign};

/// Set of simultaneously pending single-bit events.
///
/// # Example
///
/// ```rust
/// use hsm_dispatch::core::{EventCode, SignalSet};
///
/// let set = SignalSet::new(0b1_0101);
/// let order: Vec<u32> = set.into_iter().filter_map(|c| c.bit_index()).collect();
/// assert_eq!(order, vec![0, 2, 4]);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSet(u32);

impl SignalSet {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of pending events.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set every bit of `code`.
    pub fn insert(&mut self, code: EventCode) {
        self.0 |= code.raw();
    }

    /// True when every bit of `code` is set.
    pub const fn contains(self, code: EventCode) -> bool {
        code.raw() != 0 && self.0 & code.raw() == code.raw()
    }

    pub const fn iter(self) -> SignalEvents {
        SignalEvents { remaining: self.0 }
    }
}

impl From<EventCode> for SignalSet {
    fn from(code: EventCode) -> Self {
        Self(code.raw())
    }
}

impl BitOr for SignalSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SignalSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<EventCode> for SignalSet {
    fn from_iter<I: IntoIterator<Item = EventCode>>(iter: I) -> Self {
        let mut set = Self::empty();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

impl IntoIterator for SignalSet {
    type Item = EventCode;
    type IntoIter = SignalEvents;

    fn into_iter(self) -> SignalEvents {
        self.iter()
    }
}

/// Iterator over the bits of a [`SignalSet`], least significant first.
///
/// Works on its own copy of the word and clears each bit as it is yielded,
/// so it is finite and cannot be restarted.
#[derive(Clone, Debug)]
pub struct SignalEvents {
    remaining: u32,
}

impl Iterator for SignalEvents {
    type Item = EventCode;

    fn next(&mut self) -> Option<EventCode> {
        if self.remaining == 0 {
            return None;
        }
        let lowest = self.remaining & self.remaining.wrapping_neg();
        self.remaining &= !lowest;
        Some(EventCode::new(lowest))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SignalEvents {}

impl FusedIterator for SignalEvents {}
