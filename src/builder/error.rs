//! Build errors for the machine builder.

use crate::core::EventCode;
use thiserror::Error;

/// One problem with a declared user event.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EventViolation {
    #[error("{code} overlaps the reserved sentinel bits")]
    Reserved { code: EventCode },

    #[error("{code} is not a single bit, but the machine delivers through signals")]
    NotSingleBit { code: EventCode },

    #[error("{code} is declared more than once")]
    Duplicate { code: EventCode },
}

/// Errors that can occur when building a state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("No delivery path. Call .transport(..) or .signals(..) before .build()")]
    NoDeliveryPath,

    #[error("{} invalid user event declaration(s)", .0.len())]
    InvalidEvents(Vec<EventViolation>),
}
