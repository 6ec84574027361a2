//! Incremental state reconstruction from a trace record stream.
//!
//! A [`StateTracker`] is fed every record the host emits for one instance,
//! in sequence order. Only `Closed` records of activities the definition
//! classifies as states move the tracker; everything else just advances
//! the sequence cursor.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookmark::BookmarkSource;
use crate::definition::{ActivityKind, StateMachineDefinition};
use crate::error::TrackingError;
use crate::record::{InstanceState, TraceRecord};

/// Default bound on remembered states.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// A tracker shared between the tracking participant and readers.
pub type SharedStateTracker = Arc<Mutex<StateTracker>>;

/// Reconstructed state of one named state machine within one host instance.
#[derive(Debug, Clone)]
pub struct StateTracker {
    instance_id: Uuid,
    definition: Arc<StateMachineDefinition>,
    current_state: Option<String>,
    history: VecDeque<String>,
    max_history: usize,
    transitions: BTreeSet<String>,
    last_sequence: Option<u64>,
}

impl StateTracker {
    /// Create an empty tracker for a freshly started instance.
    pub fn new(
        definition: Arc<StateMachineDefinition>,
        instance_id: Uuid,
        max_history: usize,
    ) -> Result<Self, TrackingError> {
        if max_history == 0 {
            return Err(TrackingError::InvalidHistoryLength(max_history));
        }
        Ok(StateTracker {
            instance_id,
            definition,
            current_state: None,
            history: VecDeque::with_capacity(max_history),
            max_history,
            transitions: BTreeSet::new(),
            last_sequence: None,
        })
    }

    /// Wrap for sharing with a tracking sink.
    pub fn into_shared(self) -> SharedStateTracker {
        Arc::new(Mutex::new(self))
    }

    /// Apply the next record. Returns `true` when the current state changed.
    ///
    /// Records for another instance, or whose sequence number does not
    /// strictly increase, are rejected without touching the tracker.
    pub fn update(
        &mut self,
        record: &TraceRecord,
        bookmarks: &dyn BookmarkSource,
    ) -> Result<bool, TrackingError> {
        if record.instance_id != self.instance_id {
            return Err(TrackingError::InstanceMismatch {
                expected: self.instance_id,
                received: record.instance_id,
            });
        }
        if let Some(last) = self.last_sequence {
            if record.sequence_number <= last {
                return Err(TrackingError::OutOfOrderUpdate {
                    last,
                    received: record.sequence_number,
                });
            }
        }
        self.last_sequence = Some(record.sequence_number);

        if record.state != InstanceState::Closed
            || self.definition.classify(&record.activity_name) != ActivityKind::State
        {
            return Ok(false);
        }

        self.enter(record.activity_name.clone());
        self.transitions = bookmarks.bookmarks();
        tracing::debug!(
            instance_id = %self.instance_id,
            state_machine = %self.definition.name,
            sequence = record.sequence_number,
            state = %record.activity_name,
            "state machine entered state"
        );
        Ok(true)
    }

    fn enter(&mut self, state: String) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(state.clone());
        self.current_state = Some(state);
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn definition(&self) -> &Arc<StateMachineDefinition> {
        &self.definition
    }

    /// Name of the state machine this tracker reconstructs.
    pub fn state_machine(&self) -> &str {
        &self.definition.name
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current_state.as_deref()
    }

    /// Previously entered states, oldest first, ending with the current state.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.history.iter().map(String::as_str)
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Bookmarks outstanding when the current state was entered.
    pub fn transitions(&self) -> &BTreeSet<String> {
        &self.transitions
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Whether the current state is declared terminal.
    pub fn is_terminal(&self) -> bool {
        self.current_state
            .as_deref()
            .is_some_and(|s| self.definition.is_terminal(s))
    }

    /// Capture the persistable form of this tracker.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            instance_id: self.instance_id,
            state_machine: self.definition.name.clone(),
            current_state: self.current_state.clone(),
            history: self.history.iter().cloned().collect(),
            transitions: self.transitions.clone(),
            max_history: self.max_history,
            last_sequence: self.last_sequence,
        }
    }

    /// Rebuild a tracker from a persisted snapshot.
    ///
    /// The snapshot must have been taken for `definition`, every state it
    /// names must still be declared there, and its current state must be the
    /// newest history entry.
    pub fn restore(
        definition: Arc<StateMachineDefinition>,
        snapshot: TrackerSnapshot,
    ) -> Result<Self, TrackingError> {
        if snapshot.state_machine != definition.name {
            return Err(TrackingError::DefinitionMismatch {
                expected: definition.name.clone(),
                found: snapshot.state_machine,
            });
        }
        let mut tracker =
            StateTracker::new(definition, snapshot.instance_id, snapshot.max_history)?;
        for state in snapshot
            .history
            .iter()
            .chain(snapshot.current_state.iter())
        {
            if !tracker.definition.is_state(state) {
                return Err(TrackingError::UnknownState {
                    state_machine: tracker.definition.name.clone(),
                    state: state.clone(),
                });
            }
        }
        if snapshot.history.last() != snapshot.current_state.as_ref() {
            return Err(TrackingError::InconsistentSnapshot {
                current: snapshot.current_state,
                newest: snapshot.history.last().cloned(),
            });
        }
        let skip = snapshot.history.len().saturating_sub(tracker.max_history);
        tracker.history = snapshot.history.into_iter().skip(skip).collect();
        tracker.current_state = snapshot.current_state;
        tracker.transitions = snapshot.transitions;
        tracker.last_sequence = snapshot.last_sequence;
        Ok(tracker)
    }
}

/// Persisted form of a [`StateTracker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub instance_id: Uuid,
    pub state_machine: String,
    pub current_state: Option<String>,
    pub history: Vec<String>,
    pub transitions: BTreeSet<String>,
    pub max_history: usize,
    pub last_sequence: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn definition() -> Arc<StateMachineDefinition> {
        Arc::new(
            StateMachineDefinition::builder("Turnstile", "Locked")
                .state("Unlocked")
                .terminal("Broken")
                .transition("Coin", "Locked", "Unlocked")
                .transition("Push", "Unlocked", "Locked")
                .transition("Kick", "Locked", "Broken")
                .build()
                .unwrap(),
        )
    }

    fn closed(seq: u64, name: &str) -> TraceRecord {
        TraceRecord::builder(Uuid::nil(), seq, name, InstanceState::Closed).build()
    }

    fn bookmarks(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_history_is_rejected() {
        assert_eq!(
            StateTracker::new(definition(), Uuid::nil(), 0).unwrap_err(),
            TrackingError::InvalidHistoryLength(0)
        );
    }

    #[test]
    fn closed_state_records_move_the_tracker() {
        let mut t = StateTracker::new(definition(), Uuid::nil(), 5).unwrap();
        assert_eq!(t.current_state(), None);
        assert!(t.update(&closed(1, "Locked"), &bookmarks(&["Coin"])).unwrap());
        assert_eq!(t.current_state(), Some("Locked"));
        assert_eq!(t.transitions(), &bookmarks(&["Coin"]));

        // Transition and executing records leave the state alone.
        assert!(!t.update(&closed(2, "Coin"), &bookmarks(&[])).unwrap());
        let executing =
            TraceRecord::builder(Uuid::nil(), 3, "Unlocked", InstanceState::Executing).build();
        assert!(!t.update(&executing, &bookmarks(&[])).unwrap());
        assert_eq!(t.current_state(), Some("Locked"));
        assert_eq!(t.transitions(), &bookmarks(&["Coin"]));

        assert!(t.update(&closed(4, "Unlocked"), &bookmarks(&["Push"])).unwrap());
        assert_eq!(t.history().collect::<Vec<_>>(), vec!["Locked", "Unlocked"]);
        assert_eq!(t.last_sequence(), Some(4));
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut t = StateTracker::new(definition(), Uuid::nil(), 2).unwrap();
        let none = bookmarks(&[]);
        t.update(&closed(1, "Locked"), &none).unwrap();
        t.update(&closed(2, "Unlocked"), &none).unwrap();
        t.update(&closed(3, "Locked"), &none).unwrap();
        assert_eq!(t.history().collect::<Vec<_>>(), vec!["Unlocked", "Locked"]);
    }

    #[test]
    fn out_of_order_record_is_rejected_and_ignored() {
        let mut t = StateTracker::new(definition(), Uuid::nil(), 5).unwrap();
        let none = bookmarks(&[]);
        t.update(&closed(5, "Locked"), &none).unwrap();
        let err = t.update(&closed(5, "Unlocked"), &none).unwrap_err();
        assert_eq!(
            err,
            TrackingError::OutOfOrderUpdate {
                last: 5,
                received: 5
            }
        );
        assert_eq!(t.current_state(), Some("Locked"));
    }

    #[test]
    fn record_for_other_instance_is_rejected() {
        let mut t = StateTracker::new(definition(), Uuid::nil(), 5).unwrap();
        let other = Uuid::new_v4();
        let r = TraceRecord::builder(other, 1, "Locked", InstanceState::Closed).build();
        assert!(matches!(
            t.update(&r, &bookmarks(&[])),
            Err(TrackingError::InstanceMismatch { received, .. }) if received == other
        ));
        assert_eq!(t.last_sequence(), None);
    }

    #[test]
    fn terminal_state_detected() {
        let mut t = StateTracker::new(definition(), Uuid::nil(), 5).unwrap();
        t.update(&closed(1, "Locked"), &bookmarks(&[])).unwrap();
        assert!(!t.is_terminal());
        t.update(&closed(2, "Broken"), &bookmarks(&[])).unwrap();
        assert!(t.is_terminal());
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut t = StateTracker::new(definition(), Uuid::new_v4(), 3).unwrap();
        t.update(
            &TraceRecord::builder(t.instance_id(), 1, "Locked", InstanceState::Closed).build(),
            &bookmarks(&["Coin"]),
        )
        .unwrap();
        let snap = t.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: TrackerSnapshot = serde_json::from_str(&json).unwrap();
        let restored = StateTracker::restore(definition(), back).unwrap();
        assert_eq!(restored.current_state(), t.current_state());
        assert_eq!(
            restored.history().collect::<Vec<_>>(),
            t.history().collect::<Vec<_>>()
        );
        assert_eq!(restored.transitions(), t.transitions());
        assert_eq!(restored.last_sequence(), Some(1));
    }

    #[test]
    fn restore_rejects_other_state_machine() {
        let mut snap = StateTracker::new(definition(), Uuid::nil(), 3)
            .unwrap()
            .snapshot();
        snap.state_machine = "Elevator".to_string();
        assert!(matches!(
            StateTracker::restore(definition(), snap),
            Err(TrackingError::DefinitionMismatch { .. })
        ));
    }

    #[test]
    fn restore_rejects_undeclared_state() {
        let mut snap = StateTracker::new(definition(), Uuid::nil(), 3)
            .unwrap()
            .snapshot();
        snap.current_state = Some("Spinning".to_string());
        snap.history = vec!["Spinning".to_string()];
        assert!(matches!(
            StateTracker::restore(definition(), snap),
            Err(TrackingError::UnknownState { state, .. }) if state == "Spinning"
        ));
    }

    #[test]
    fn restore_rejects_current_state_missing_from_history() {
        let mut snap = StateTracker::new(definition(), Uuid::nil(), 3)
            .unwrap()
            .snapshot();
        snap.current_state = Some("Locked".to_string());
        assert_eq!(
            StateTracker::restore(definition(), snap.clone()).unwrap_err(),
            TrackingError::InconsistentSnapshot {
                current: Some("Locked".to_string()),
                newest: None,
            }
        );

        snap.history = vec!["Locked".to_string(), "Unlocked".to_string()];
        assert!(matches!(
            StateTracker::restore(definition(), snap),
            Err(TrackingError::InconsistentSnapshot { .. })
        ));
    }

    fn activity() -> impl Strategy<Value = (String, InstanceState)> {
        (
            prop::sample::select(vec!["Locked", "Unlocked", "Broken", "Coin", "Push", "Root"]),
            prop::sample::select(vec![
                InstanceState::Executing,
                InstanceState::Closed,
                InstanceState::Canceled,
                InstanceState::Faulted,
            ]),
        )
            .prop_map(|(name, state)| (name.to_string(), state))
    }

    proptest! {
        #[test]
        fn history_is_the_last_closed_states(
            max_history in 1usize..6,
            stream in prop::collection::vec(activity(), 0..60),
        ) {
            let def = definition();
            let mut tracker = StateTracker::new(def.clone(), Uuid::nil(), max_history).unwrap();
            let none = BTreeSet::new();
            let mut expected = Vec::new();
            for (i, (name, state)) in stream.iter().enumerate() {
                let record =
                    TraceRecord::builder(Uuid::nil(), i as u64, name.as_str(), *state).build();
                tracker.update(&record, &none).unwrap();
                if *state == InstanceState::Closed && def.is_state(name) {
                    expected.push(name.clone());
                }
                prop_assert!(tracker.history().len() <= max_history);
            }
            let tail: Vec<String> = expected
                .iter()
                .skip(expected.len().saturating_sub(max_history))
                .cloned()
                .collect();
            let history: Vec<String> = tracker.history().map(String::from).collect();
            prop_assert_eq!(&history, &tail);
            prop_assert_eq!(tracker.current_state(), expected.last().map(String::as_str));
        }
    }
}
