use statetrack_core::InstanceState;

/// A trace assertion that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssertionError {
    /// An expected name is not a state of the state machine being checked.
    #[error("'{state}' is not a state of state machine '{state_machine}'")]
    UnknownState {
        state_machine: String,
        state: String,
    },

    /// No closed record for `expected` at or after `searched_from`.
    ///
    /// `position` is the index of `expected` in the list that was checked;
    /// `last_matched` describes the record matched for the previous entry.
    /// When that record sat at `u64::MAX`, `searched_from` stays `u64::MAX`.
    #[error(
        "state '{expected}' (position {position}) was not entered at or after sequence {searched_from}; last matched: {}",
        .last_matched.as_deref().unwrap_or("nothing")
    )]
    Missing {
        expected: String,
        position: usize,
        searched_from: u64,
        last_matched: Option<String>,
    },

    /// No record for the activity ever reached the requested state.
    #[error("activity '{activity}' never reached state {state}")]
    NeverReached {
        activity: String,
        state: InstanceState,
    },
}
