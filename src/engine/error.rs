//! Errors surfaced by raising events and requesting transitions.
//!
//! None of these are fatal. A failed raise leaves nothing allocated and the
//! caller decides whether to retry or drop the event.

use crate::core::{AllocError, EventCode};
use thiserror::Error;

/// Errors from [`Raiser::raise_event`](crate::engine::Raiser::raise_event).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RaiseError {
    #[error("no room to allocate an envelope for event {code}")]
    Allocation {
        code: EventCode,
        #[source]
        source: AllocError,
    },

    #[error("transport rejected event {code}")]
    Post { code: EventCode },

    #[error("event {code} is not a single bit and cannot be signalled")]
    NotASignal { code: EventCode },

    #[error("event {code} is in the reserved range but is not ENTRY, EXIT, TIMED or INVALID")]
    ReservedCode { code: EventCode },

    #[error("event {code} cannot carry a payload on this delivery path")]
    PayloadUnsupported { code: EventCode },

    #[error("event {code} is not in the machine's declared event catalog")]
    Undeclared { code: EventCode },

    #[error("no transport or signal port is available to deliver event {code}")]
    NoDeliveryPath { code: EventCode },
}

impl RaiseError {
    /// The event that failed to go out.
    pub fn code(&self) -> EventCode {
        match self {
            Self::Allocation { code, .. }
            | Self::Post { code }
            | Self::NotASignal { code }
            | Self::ReservedCode { code }
            | Self::PayloadUnsupported { code }
            | Self::Undeclared { code }
            | Self::NoDeliveryPath { code } => *code,
        }
    }

    /// Allocation and post failures are transient; the rest are misuse.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Allocation { .. } | Self::Post { .. })
    }
}

/// Errors from [`StateMachine::transition_to`](crate::engine::StateMachine::transition_to).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition from '{current}' to '{pending}' is still waiting for complete_transition()")]
    AlreadyPending { current: String, pending: String },

    #[error(transparent)]
    Raise(#[from] RaiseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_reported_for_every_variant() {
        let code = EventCode::user_flag(3);
        let errors = [
            RaiseError::Allocation {
                code,
                source: AllocError {
                    size: 8,
                    outstanding: 1,
                },
            },
            RaiseError::Post { code },
            RaiseError::NotASignal { code },
            RaiseError::ReservedCode { code },
            RaiseError::PayloadUnsupported { code },
            RaiseError::Undeclared { code },
            RaiseError::NoDeliveryPath { code },
        ];
        for err in errors {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn only_resource_failures_are_retryable() {
        let code = EventCode::user_flag(0);
        assert!(RaiseError::Post { code }.is_retryable());
        assert!(!RaiseError::NotASignal { code }.is_retryable());
    }

    #[test]
    fn messages_name_the_event() {
        let err = RaiseError::Post {
            code: EventCode::EXIT,
        };
        assert_eq!(err.to_string(), "transport rejected event EXIT");

        let err = TransitionError::from(err);
        assert_eq!(err.to_string(), "transport rejected event EXIT");
    }
}
