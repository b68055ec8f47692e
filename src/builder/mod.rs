//! Builder API for machine construction.
//!
//! This module provides a fluent builder that validates the delivery setup
//! and the user event catalog before a machine exists, plus the
//! [`user_events!`](crate::user_events) macro for declaring that catalog.

pub mod error;
pub mod machine;
pub mod macros;
pub mod validation;

pub use error::{BuildError, EventViolation};
pub use machine::MachineBuilder;
pub use validation::validate_events;
