//! Event codes and the four reserved sentinel events.
//!
//! An event code is a bitmask-capable `u32`. The low four bits are reserved
//! for the engine (`ENTRY`, `EXIT`, `TIMED`, `INVALID`); everything from
//! [`EventCode::USER_RESERVED`] upward belongs to application code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric event code.
///
/// User codes come in two flavours:
///
/// - **flags** built with [`EventCode::user_flag`]: a single bit, usable with
///   every delivery substrate including the 32-bit signal word;
/// - **sequential** codes built with [`EventCode::sequential`]: arbitrary
///   values above the reserved range, only deliverable through a transport.
///
/// # Example
///
/// ```rust
/// use hsm_dispatch::core::EventCode;
///
/// let button = EventCode::user_flag(0);
/// assert_eq!(button, EventCode::USER_RESERVED);
/// assert!(button.is_user());
/// assert!(button.is_single_bit());
///
/// let packet = EventCode::sequential(3);
/// assert_eq!(packet.raw(), 0x13);
/// assert!(!packet.is_single_bit());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(u32);

impl EventCode {
    /// Delivered to a state when it becomes current.
    pub const ENTRY: Self = Self(1 << 0);
    /// Delivered to the current state when a transition is requested.
    pub const EXIT: Self = Self(1 << 1);
    /// Delivered when the event source reports a timeout.
    pub const TIMED: Self = Self(1 << 2);
    /// Delivered for a message the host could not make sense of.
    pub const INVALID: Self = Self(1 << 3);
    /// First code available to application code.
    pub const USER_RESERVED: Self = Self(1 << 4);

    /// Width of the signal word, independent of the code's storage width.
    pub const SIGNAL_WIDTH: u32 = 32;

    /// Number of single-bit user flags that fit in the signal word.
    pub const USER_FLAG_COUNT: u32 = Self::SIGNAL_WIDTH - Self::USER_RESERVED.0.trailing_zeros();

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The `n`-th sequential user code (`USER_RESERVED + n`).
    ///
    /// # Panics
    ///
    /// Panics if the result does not fit in a `u32`. In a `const` context
    /// this is a compile error.
    pub const fn sequential(n: u32) -> Self {
        match Self::USER_RESERVED.0.checked_add(n) {
            Some(raw) => Self(raw),
            None => panic!("sequential event code overflows u32"),
        }
    }

    /// The `index`-th single-bit user flag (`USER_RESERVED << index`).
    ///
    /// # Panics
    ///
    /// Panics if `index >= USER_FLAG_COUNT`. In a `const` context this is a
    /// compile error.
    pub const fn user_flag(index: u32) -> Self {
        assert!(
            index < Self::USER_FLAG_COUNT,
            "user flag index exceeds the signal word"
        );
        Self(Self::USER_RESERVED.0 << index)
    }

    /// True for every value below [`EventCode::USER_RESERVED`].
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER_RESERVED.0
    }

    pub const fn is_user(self) -> bool {
        !self.is_reserved()
    }

    pub const fn is_single_bit(self) -> bool {
        self.0.is_power_of_two()
    }

    /// Bit position of a single-bit code, `None` otherwise.
    pub const fn bit_index(self) -> Option<u32> {
        if self.is_single_bit() {
            Some(self.0.trailing_zeros())
        } else {
            None
        }
    }
}

impl From<u32> for EventCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Sentinel> for EventCode {
    fn from(sentinel: Sentinel) -> Self {
        sentinel.code()
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Sentinel::from_code(*self) {
            Some(sentinel) => f.write_str(sentinel.name()),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

/// The four engine events that travel as static envelopes.
///
/// Sentinels are never allocated, never released and never carry a payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Sentinel {
    Entry,
    Exit,
    Timed,
    Invalid,
}

impl Sentinel {
    pub const ALL: [Sentinel; 4] = [
        Sentinel::Entry,
        Sentinel::Exit,
        Sentinel::Timed,
        Sentinel::Invalid,
    ];

    pub const fn code(self) -> EventCode {
        match self {
            Self::Entry => EventCode::ENTRY,
            Self::Exit => EventCode::EXIT,
            Self::Timed => EventCode::TIMED,
            Self::Invalid => EventCode::INVALID,
        }
    }

    /// Exact match only: combined reserved bits are not a sentinel.
    pub const fn from_code(code: EventCode) -> Option<Self> {
        match code.0 {
            0x1 => Some(Self::Entry),
            0x2 => Some(Self::Exit),
            0x4 => Some(Self::Timed),
            0x8 => Some(Self::Invalid),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
            Self::Timed => "TIMED",
            Self::Invalid => "INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes_are_distinct_single_bits() {
        let codes = [
            EventCode::ENTRY,
            EventCode::EXIT,
            EventCode::TIMED,
            EventCode::INVALID,
        ];
        let mut seen = 0u32;
        for code in codes {
            assert!(code.is_single_bit());
            assert!(code.is_reserved());
            assert_eq!(seen & code.raw(), 0);
            seen |= code.raw();
        }
        assert_eq!(seen, 0xF);
    }

    #[test]
    fn user_flags_cover_the_rest_of_the_signal_word() {
        assert_eq!(EventCode::USER_FLAG_COUNT, 28);
        assert_eq!(EventCode::user_flag(0), EventCode::USER_RESERVED);
        assert_eq!(EventCode::user_flag(27).raw(), 1 << 31);
        assert_eq!(EventCode::user_flag(27).bit_index(), Some(31));
    }

    #[test]
    #[should_panic(expected = "signal word")]
    fn user_flag_past_the_signal_word_panics() {
        let _ = EventCode::user_flag(EventCode::USER_FLAG_COUNT);
    }

    #[test]
    fn sequential_codes_start_at_user_reserved() {
        assert_eq!(EventCode::sequential(0), EventCode::USER_RESERVED);
        assert_eq!(EventCode::sequential(7).raw(), 23);
        assert!(EventCode::sequential(7).is_user());
        assert_eq!(EventCode::sequential(1).bit_index(), None);
    }

    #[test]
    fn sentinel_round_trips_through_code() {
        for sentinel in Sentinel::ALL {
            assert_eq!(Sentinel::from_code(sentinel.code()), Some(sentinel));
        }
        assert_eq!(
            Sentinel::from_code(EventCode::new(0x3)),
            None,
            "combined bits are not a sentinel"
        );
        assert_eq!(Sentinel::from_code(EventCode::USER_RESERVED), None);
    }

    #[test]
    fn display_names_sentinels_and_hex_for_the_rest() {
        assert_eq!(EventCode::EXIT.to_string(), "EXIT");
        assert_eq!(EventCode::user_flag(1).to_string(), "0x20");
    }

    #[test]
    fn event_code_serializes_as_plain_integer() {
        let json = serde_json::to_string(&EventCode::user_flag(2)).unwrap();
        assert_eq!(json, "64");
        let back: EventCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventCode::user_flag(2));
    }
}
