use statetrack_core::{InstanceState, RecordQuery, RecordStore, StateMachineDefinition};

use crate::error::AssertionError;

/// Check that the states in `expected` were each entered, in that order.
///
/// Matches need not be adjacent: for every entry the search starts just
/// after the record matched for the previous one. An empty list holds
/// trivially.
pub fn occurs_in_order<S>(
    definition: &StateMachineDefinition,
    store: &RecordStore,
    expected: &[S],
) -> Result<(), AssertionError>
where
    S: AsRef<str>,
{
    if let Some(unknown) = expected
        .iter()
        .map(AsRef::as_ref)
        .find(|name| !definition.is_state(name))
    {
        return Err(AssertionError::UnknownState {
            state_machine: definition.name.clone(),
            state: unknown.to_string(),
        });
    }

    // `None` once a match lands on the highest possible sequence number:
    // nothing can follow it.
    let mut cursor = Some(0u64);
    let mut last_matched: Option<String> = None;
    for (position, name) in expected.iter().map(AsRef::as_ref).enumerate() {
        let found = cursor.and_then(|from| {
            store
                .first(&RecordQuery::closed(name).starting_at(from))
                .ok()
        });
        match found {
            Some(record) => {
                cursor = record.sequence_number.checked_add(1);
                last_matched = Some(record.to_string());
            }
            None => {
                return Err(AssertionError::Missing {
                    expected: name.to_string(),
                    position,
                    searched_from: cursor.unwrap_or(u64::MAX),
                    last_matched,
                });
            }
        }
    }
    Ok(())
}

/// True if any record for `activity` reached `state`, anywhere in the store.
pub fn exists(store: &RecordStore, activity: &str, state: InstanceState) -> bool {
    store.count(&RecordQuery::new().activity(activity).state(state)) > 0
}

/// [`exists`], reporting a miss as an error.
pub fn assert_exists(
    store: &RecordStore,
    activity: &str,
    state: InstanceState,
) -> Result<(), AssertionError> {
    if exists(store, activity, state) {
        Ok(())
    } else {
        Err(AssertionError::NeverReached {
            activity: activity.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TraceBuilder;

    fn door_definition() -> StateMachineDefinition {
        StateMachineDefinition::builder("SecurityDoor", "ClosedLocked")
            .state("ClosedUnlocked")
            .state("Open")
            .transition("AuthorizeValidKey", "ClosedLocked", "ClosedUnlocked")
            .transition("DoorOpened", "ClosedUnlocked", "Open")
            .transition("UnlockedTimeout", "ClosedUnlocked", "ClosedLocked")
            .build()
            .unwrap()
    }

    #[test]
    fn empty_expectation_holds() {
        let store = RecordStore::new();
        let expected: [&str; 0] = [];
        assert!(occurs_in_order(&door_definition(), &store, &expected).is_ok());
    }

    #[test]
    fn gaps_between_matches_are_allowed() {
        let store = TraceBuilder::new()
            .activity("ClosedLocked")
            .activity("AuthorizeValidKey")
            .activity("ClosedUnlocked")
            .activity("DoorOpened")
            .activity("Open")
            .build()
            .unwrap();
        occurs_in_order(&door_definition(), &store, &["ClosedLocked", "Open"]).unwrap();
    }

    #[test]
    fn out_of_order_occurrence_fails() {
        let store = TraceBuilder::new()
            .activity("ClosedUnlocked")
            .activity("ClosedLocked")
            .build()
            .unwrap();
        let err = occurs_in_order(
            &door_definition(),
            &store,
            &["ClosedLocked", "ClosedUnlocked"],
        )
        .unwrap_err();
        match err {
            AssertionError::Missing {
                expected,
                position,
                searched_from,
                last_matched,
            } => {
                assert_eq!(expected, "ClosedUnlocked");
                assert_eq!(position, 1);
                assert_eq!(searched_from, 4);
                assert!(last_matched.unwrap().contains("ClosedLocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_state_needs_repeated_records() {
        let store = TraceBuilder::new().activity("ClosedLocked").build().unwrap();
        assert!(occurs_in_order(
            &door_definition(),
            &store,
            &["ClosedLocked", "ClosedLocked"]
        )
        .is_err());
    }

    #[test]
    fn record_at_highest_sequence_matches_only_once() {
        let store = TraceBuilder::new()
            .record_at(u64::MAX, "ClosedLocked", InstanceState::Closed)
            .build()
            .unwrap();
        occurs_in_order(&door_definition(), &store, &["ClosedLocked"]).unwrap();
        let err = occurs_in_order(
            &door_definition(),
            &store,
            &["ClosedLocked", "ClosedLocked"],
        )
        .unwrap_err();
        assert!(matches!(err, AssertionError::Missing { position: 1, .. }));
    }

    #[test]
    fn executing_record_alone_does_not_count() {
        let store = TraceBuilder::new().executing("ClosedLocked").build().unwrap();
        assert!(occurs_in_order(&door_definition(), &store, &["ClosedLocked"]).is_err());
    }

    #[test]
    fn transition_names_are_rejected() {
        let err = occurs_in_order(&door_definition(), &RecordStore::new(), &["DoorOpened"])
            .unwrap_err();
        assert!(matches!(err, AssertionError::UnknownState { .. }));
    }

    #[test]
    fn exists_ignores_position() {
        let store = TraceBuilder::new()
            .activity("ClosedUnlocked")
            .activity("UnlockedTimeout")
            .activity("ClosedLocked")
            .build()
            .unwrap();
        assert!(exists(&store, "UnlockedTimeout", InstanceState::Closed));
        assert!(exists(&store, "UnlockedTimeout", InstanceState::Executing));
        assert!(!exists(&store, "OpenTimeout", InstanceState::Closed));
        assert_eq!(
            assert_exists(&store, "OpenTimeout", InstanceState::Closed),
            Err(AssertionError::NeverReached {
                activity: "OpenTimeout".to_string(),
                state: InstanceState::Closed,
            })
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const STATES: [&str; 3] = ["ClosedLocked", "ClosedUnlocked", "Open"];

        proptest! {
            #[test]
            fn every_subsequence_of_the_trace_occurs_in_order(
                picks in prop::collection::vec((0usize..3, any::<bool>()), 0..24)
            ) {
                let mut builder = TraceBuilder::new();
                let mut expected = Vec::new();
                for (state, keep) in &picks {
                    builder = builder.activity(STATES[*state]);
                    if *keep {
                        expected.push(STATES[*state]);
                    }
                }
                let store = builder.build().unwrap();
                prop_assert!(occurs_in_order(&door_definition(), &store, &expected).is_ok());
            }

            #[test]
            fn reversed_pair_of_single_entries_fails(first in 0usize..3, second in 0usize..3) {
                prop_assume!(first != second);
                let store = TraceBuilder::new()
                    .activity(STATES[first])
                    .activity(STATES[second])
                    .build()
                    .unwrap();
                prop_assert!(
                    occurs_in_order(&door_definition(), &store, &[STATES[second], STATES[first]])
                        .is_err()
                );
            }
        }
    }
}
