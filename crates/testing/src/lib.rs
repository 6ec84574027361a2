//! Assertions over the records a tracked instance produced.
//!
//! [`occurs_in_order`] checks that a sequence of states was entered in
//! order (not necessarily contiguously); [`exists`] checks that an activity
//! reached a given state anywhere in the trace. The `assert_*` macros wrap
//! both for use inside `#[test]` functions.

mod assertions;
mod error;
pub mod fixtures;
mod macros;

pub use assertions::{assert_exists, exists, occurs_in_order};
pub use error::AssertionError;
pub use statetrack_core::InstanceState;
