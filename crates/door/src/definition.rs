use statetrack_core::{StateMachineDefinition, TransitionDefinition};

pub const STATE_MACHINE: &str = "SecurityDoor";

/// State activity names.
pub mod states {
    pub const CLOSED_LOCKED: &str = "ClosedLocked";
    pub const CLOSED_UNLOCKED: &str = "ClosedUnlocked";
    pub const OPEN: &str = "Open";
    pub const INTRUSION_DETECT: &str = "IntrusionDetect";
    pub const ALERT: &str = "Alert";
}

/// Transition activity names.
pub mod activities {
    pub const AUTHORIZE_VALID_KEY: &str = "AuthorizeValidKey";
    pub const AUTHORIZE_INVALID_KEY: &str = "AuthorizeInvalidKey";
    pub const DOOR_OPENED: &str = "DoorOpened";
    pub const DOOR_CLOSED: &str = "DoorClosed";
    pub const UNLOCKED_TIMEOUT: &str = "UnlockedTimeout";
    pub const OPEN_TIMEOUT: &str = "OpenTimeout";
    pub const INTRUSION_CLEARED: &str = "IntrusionCleared";
    pub const INTRUSION_ALERT: &str = "IntrusionAlert";

    /// Bookmark names exposed while the door waits for input.
    pub const AUTHORIZE_KEY: &str = "AuthorizeKey";
    pub const NOTIFY_DOOR_STATUS: &str = "NotifyDoorStatus";
}

use activities::*;
use states::*;

const TRANSITIONS: [(&str, &str, &str); 8] = [
    (AUTHORIZE_VALID_KEY, CLOSED_LOCKED, CLOSED_UNLOCKED),
    (AUTHORIZE_INVALID_KEY, CLOSED_LOCKED, INTRUSION_DETECT),
    (DOOR_OPENED, CLOSED_UNLOCKED, OPEN),
    (DOOR_CLOSED, OPEN, CLOSED_LOCKED),
    (UNLOCKED_TIMEOUT, CLOSED_UNLOCKED, CLOSED_LOCKED),
    (OPEN_TIMEOUT, OPEN, ALERT),
    (INTRUSION_CLEARED, INTRUSION_DETECT, CLOSED_LOCKED),
    (INTRUSION_ALERT, INTRUSION_DETECT, ALERT),
];

/// The security door state machine.
pub fn definition() -> StateMachineDefinition {
    StateMachineDefinition {
        name: STATE_MACHINE.to_string(),
        initial_state: CLOSED_LOCKED.to_string(),
        states: [CLOSED_LOCKED, CLOSED_UNLOCKED, OPEN, INTRUSION_DETECT, ALERT]
            .into_iter()
            .map(String::from)
            .collect(),
        terminal_states: [ALERT.to_string()].into(),
        transitions: TRANSITIONS
            .iter()
            .map(|(name, from, to)| TransitionDefinition {
                name: name.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect(),
    }
}

/// Host-assigned id for an activity of the door workflow: `1.n` for states,
/// `2.n` for transitions.
pub(crate) fn activity_id(name: &str) -> Option<String> {
    const STATES: [&str; 5] = [CLOSED_LOCKED, CLOSED_UNLOCKED, OPEN, INTRUSION_DETECT, ALERT];
    if let Some(i) = STATES.iter().position(|s| *s == name) {
        return Some(format!("1.{}", i + 1));
    }
    TRANSITIONS
        .iter()
        .position(|(t, _, _)| *t == name)
        .map(|i| format!("2.{}", i + 1))
}

/// Bookmarks the host exposes while an instance rests in `state`.
pub fn bookmarks_for(state: &str) -> &'static [&'static str] {
    match state {
        CLOSED_LOCKED => &[AUTHORIZE_KEY],
        CLOSED_UNLOCKED | OPEN => &[NOTIFY_DOOR_STATUS],
        _ => &[],
    }
}
