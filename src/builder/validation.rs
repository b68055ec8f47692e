//! Checks on declared user events, accumulated with `Validation`.

use crate::builder::error::EventViolation;
use crate::core::EventCode;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Validate a user event catalog, collecting every violation.
///
/// Each code must sit above the sentinel bits and be declared once. In
/// signal mode it must also be a single bit.
pub fn validate_events(
    events: &[EventCode],
    signal_mode: bool,
) -> Validation<(), NonEmptyVec<EventViolation>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<EventViolation>>> = Vec::new();
    let mut seen = HashSet::new();

    for &code in events {
        checks.push(if code.is_user() {
            Validation::success(())
        } else {
            Validation::fail(EventViolation::Reserved { code })
        });

        if signal_mode {
            checks.push(if code.is_single_bit() {
                Validation::success(())
            } else {
                Validation::fail(EventViolation::NotSingleBit { code })
            });
        }

        checks.push(if seen.insert(code) {
            Validation::success(())
        } else {
            Validation::fail(EventViolation::Duplicate { code })
        });
    }

    Validation::all_vec(checks).map(|_| ())
}
