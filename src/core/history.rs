//! Transition history tracking.
//!
//! Every committed state change (cold start or completed handshake) can be
//! recorded into a bounded ring so diagnostics can inspect where a machine
//! has been without the memory use growing over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// How a state became current.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Cold start through `init_state`, or `transition_to` on an idle machine.
    Init,
    /// Completed `transition_to` / `complete_transition` handshake.
    Transition,
}

/// Record of a single committed state change.
///
/// # Example
///
/// ```rust
/// use hsm_dispatch::core::{TransitionKind, TransitionRecord};
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     kind: TransitionKind::Transition,
///     from: Some("Idle".to_string()),
///     to: "Running".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "Running");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: TransitionKind,
    /// Name of the state left behind, `None` on a cold start
    pub from: Option<String>,
    /// Name of the state that became current
    pub to: String,
    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered, bounded history of transitions.
///
/// Once `capacity` records are held the oldest one is evicted. A capacity
/// of zero disables recording.
///
/// # Example
///
/// ```rust
/// use hsm_dispatch::core::{TransitionHistory, TransitionKind, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::with_capacity(8);
/// history.record(TransitionRecord {
///     kind: TransitionKind::Init,
///     from: None,
///     to: "Idle".to_string(),
///     timestamp: Utc::now(),
/// });
/// history.record(TransitionRecord {
///     kind: TransitionKind::Transition,
///     from: Some("Idle".to_string()),
///     to: "Busy".to_string(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.get_path(), vec!["Idle", "Busy"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    capacity: usize,
    transitions: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl TransitionHistory {
    pub const DEFAULT_CAPACITY: usize = 32;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, transition: TransitionRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Names of the states traversed, oldest first.
    ///
    /// Starts with the `from` of the oldest retained record when it has one,
    /// followed by the `to` of every record.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(from) = self.transitions.front().and_then(|t| t.from.as_deref()) {
            path.push(from);
        }
        path.extend(self.transitions.iter().map(|t| t.to.as_str()));
        path
    }

    /// Time between the oldest and newest retained records.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> impl ExactSizeIterator<Item = &TransitionRecord> + '_ {
        self.transitions.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.transitions.back()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: Option<&str>, to: &str) -> TransitionRecord {
        TransitionRecord {
            kind: if from.is_some() {
                TransitionKind::Transition
            } else {
                TransitionKind::Init
            },
            from: from.map(str::to_string),
            to: to.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::default();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert_eq!(history.capacity(), TransitionHistory::DEFAULT_CAPACITY);
    }

    #[test]
    fn get_path_starts_from_cold_start() {
        let mut history = TransitionHistory::with_capacity(4);
        history.record(record(None, "Idle"));
        history.record(record(Some("Idle"), "Busy"));
        history.record(record(Some("Busy"), "Idle"));

        assert_eq!(history.get_path(), vec!["Idle", "Busy", "Idle"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn oldest_record_is_evicted_when_full() {
        let mut history = TransitionHistory::with_capacity(2);
        history.record(record(None, "A"));
        history.record(record(Some("A"), "B"));
        history.record(record(Some("B"), "C"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get_path(), vec!["A", "B", "C"]);
        assert_eq!(history.last().map(|t| t.to.as_str()), Some("C"));
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history = TransitionHistory::with_capacity(0);
        history.record(record(None, "A"));
        assert!(history.is_empty());
    }

    #[test]
    fn duration_spans_first_to_last() {
        let mut history = TransitionHistory::with_capacity(4);
        history.record(record(None, "A"));
        std::thread::sleep(Duration::from_millis(10));
        history.record(record(Some("A"), "B"));

        let duration = history.duration().unwrap();
        assert!(duration >= Duration::from_millis(10));
    }

    #[test]
    fn single_record_has_zero_duration() {
        let mut history = TransitionHistory::with_capacity(4);
        history.record(record(None, "A"));
        assert_eq!(history.duration(), Some(Duration::ZERO));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = TransitionHistory::with_capacity(4);
        history.record(record(None, "A"));
        history.record(record(Some("A"), "B"));

        let json = serde_json::to_string(&history).unwrap();
        let back: TransitionHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back.get_path(), history.get_path());
        assert_eq!(back.capacity(), 4);
    }
}
