//! State machine definitions.
//!
//! A trace record only names an activity; whether that activity is a steady
//! state or a transition between states is decided here, explicitly, by the
//! definition the tracker was created with. Names are never classified by
//! convention.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

/// How a definition classifies an activity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    State,
    Transition,
    /// Any other activity (root workflow, receive/send plumbing, timers).
    Other,
}

/// A named transition between two declared states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// The states and transitions of one named state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub name: String,
    pub initial_state: String,
    pub states: BTreeSet<String>,
    #[serde(default)]
    pub terminal_states: BTreeSet<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl StateMachineDefinition {
    /// Start a definition whose initial state is also its first declared state.
    pub fn builder(name: impl Into<String>, initial_state: impl Into<String>) -> DefinitionBuilder {
        let initial_state = initial_state.into();
        let mut states = BTreeSet::new();
        states.insert(initial_state.clone());
        DefinitionBuilder {
            definition: StateMachineDefinition {
                name: name.into(),
                initial_state,
                states,
                terminal_states: BTreeSet::new(),
                transitions: Vec::new(),
            },
        }
    }

    pub fn classify(&self, activity_name: &str) -> ActivityKind {
        if self.states.contains(activity_name) {
            ActivityKind::State
        } else if self.transitions.iter().any(|t| t.name == activity_name) {
            ActivityKind::Transition
        } else {
            ActivityKind::Other
        }
    }

    pub fn is_state(&self, name: &str) -> bool {
        self.states.contains(name)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal_states.contains(state)
    }

    pub fn transition(&self, name: &str) -> Option<&TransitionDefinition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    /// Transitions whose source is `state`, in declaration order.
    pub fn transitions_from<'a>(
        &'a self,
        state: &'a str,
    ) -> impl Iterator<Item = &'a TransitionDefinition> + 'a {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    /// Check that the definition is internally consistent.
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.name.trim().is_empty() {
            return Err(TrackingError::InvalidDefinition(
                "state machine name must not be empty".to_string(),
            ));
        }
        if !self.states.contains(&self.initial_state) {
            return Err(TrackingError::InvalidDefinition(format!(
                "initial state '{}' is not a declared state",
                self.initial_state
            )));
        }
        for terminal in &self.terminal_states {
            if !self.states.contains(terminal) {
                return Err(TrackingError::InvalidDefinition(format!(
                    "terminal state '{}' is not a declared state",
                    terminal
                )));
            }
        }
        let mut seen = BTreeSet::new();
        for t in &self.transitions {
            if self.states.contains(&t.name) {
                return Err(TrackingError::InvalidDefinition(format!(
                    "'{}' is declared both as a state and as a transition",
                    t.name
                )));
            }
            if !seen.insert(t.name.as_str()) {
                return Err(TrackingError::InvalidDefinition(format!(
                    "duplicate transition '{}'",
                    t.name
                )));
            }
            for endpoint in [&t.from, &t.to] {
                if !self.states.contains(endpoint) {
                    return Err(TrackingError::InvalidDefinition(format!(
                        "transition '{}' references undeclared state '{}'",
                        t.name, endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`StateMachineDefinition`].
#[derive(Debug, Clone)]
pub struct DefinitionBuilder {
    definition: StateMachineDefinition,
}

impl DefinitionBuilder {
    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.definition.states.insert(name.into());
        self
    }

    /// Declare a terminal (absorbing) state.
    pub fn terminal(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.definition.states.insert(name.clone());
        self.definition.terminal_states.insert(name);
        self
    }

    pub fn transition(
        mut self,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.definition.transitions.push(TransitionDefinition {
            name: name.into(),
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Finish and validate.
    pub fn build(self) -> Result<StateMachineDefinition, TrackingError> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}
