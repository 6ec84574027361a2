//! The security door: a reference state machine and a simulated host.
//!
//! [`DoorService`] plays the part of a hosted workflow service. Each door it
//! hears about gets its own instance, which walks the [`definition`] state
//! machine in response to [`AuthorizeKey`] and [`DoorStatus`] messages and to
//! timeouts on a manual clock, emitting a tracking record for every activity.

mod definition;
mod error;
mod messages;
mod service;

pub use definition::{activities, bookmarks_for, definition, states, STATE_MACHINE};
pub use error::DoorError;
pub use messages::{AuthorizeKey, AuthorizeKeyResponse, DoorStatus};
pub use service::DoorService;
