use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use statetrack_core::{StateTracker, TrackerSnapshot};
use time::OffsetDateTime;
use uuid::Uuid;

/// Tracker fields registered with the instance store as queryable columns,
/// so instances can be located by state without loading the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedProperties {
    pub instance_id: Uuid,
    pub state_machine: String,
    pub current_state: Option<String>,
    pub transitions: BTreeSet<String>,
    pub history_len: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PromotedProperties {
    pub fn from_tracker(tracker: &StateTracker) -> Self {
        PromotedProperties {
            instance_id: tracker.instance_id(),
            state_machine: tracker.state_machine().to_string(),
            current_state: tracker.current_state().map(str::to_string),
            transitions: tracker.transitions().clone(),
            history_len: tracker.history().len(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Everything stored for one (instance, state machine) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStateMachine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted: Option<PromotedProperties>,
}

impl StoredStateMachine {
    pub fn is_empty(&self) -> bool {
        self.tracker.is_none() && self.promoted.is_none()
    }
}
