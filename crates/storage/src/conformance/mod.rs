//! Conformance test suite for `InstanceStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `InstanceStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Tracker persistence**: save/load round trips, overwrite, missing = `None`
//! - **Promotion**: promoted properties stored independently and findable by state
//! - **Deletion**: purge across state machines, not-found on unknown instances
//! - **Concurrency**: parallel saves of distinct instances all land
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use statetrack_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn my_store_conformance() {
//!     let report = run_conformance_suite(|| async { MyStore::connect().await }).await;
//!     assert!(report.is_clean(), "{report}");
//! }
//! ```

/// Record each case function's outcome under `group`, one fresh store per case.
macro_rules! run_cases {
    ($report:expr, $factory:expr, $group:literal, [$($case:ident),+ $(,)?]) => {
        $( $report.record($group, stringify!($case), $case($factory).await); )+
    };
}

mod concurrent;
mod delete;
mod promote;
mod tracker;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use statetrack_core::TrackerSnapshot;
use time::macros::datetime;
use uuid::Uuid;

use crate::record::PromotedProperties;
use crate::InstanceStore;

/// One conformance case and how it went.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub group: &'static str,
    pub name: &'static str,
    /// `None` when the case passed.
    pub error: Option<String>,
}

/// Every case run by [`run_conformance_suite`], in run order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    cases: Vec<CaseOutcome>,
}

impl ConformanceReport {
    fn record(&mut self, group: &'static str, name: &'static str, outcome: Result<(), String>) {
        self.cases.push(CaseOutcome {
            group,
            name,
            error: outcome.err(),
        });
    }

    pub fn cases(&self) -> &[CaseOutcome] {
        &self.cases
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.cases.iter().filter(|c| c.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        if failed == 0 {
            return write!(f, "all {} instance store cases passed", self.total());
        }
        writeln!(f, "{} of {} instance store cases failed:", failed, self.total())?;
        for case in self.failures() {
            writeln!(
                f,
                "  {}::{}: {}",
                case.group,
                case.name,
                case.error.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

/// Run every case against a store backend.
///
/// `factory` is called once per case and must return a fresh, empty store.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut report = ConformanceReport::default();
    tracker::run_tracker_tests(&factory, &mut report).await;
    promote::run_promote_tests(&factory, &mut report).await;
    delete::run_delete_tests(&factory, &mut report).await;
    concurrent::run_concurrent_tests(&factory, &mut report).await;
    report
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const STATE_MACHINE: &str = "SecurityDoor";

fn make_snapshot(instance_id: Uuid, state_machine: &str, history: &[&str]) -> TrackerSnapshot {
    TrackerSnapshot {
        instance_id,
        state_machine: state_machine.to_string(),
        current_state: history.last().map(|s| s.to_string()),
        history: history.iter().map(|s| s.to_string()).collect(),
        transitions: BTreeSet::from(["AuthorizeKey".to_string()]),
        max_history: 10,
        last_sequence: Some(history.len() as u64 * 4),
    }
}

fn make_promoted(instance_id: Uuid, state_machine: &str, state: &str) -> PromotedProperties {
    PromotedProperties {
        instance_id,
        state_machine: state_machine.to_string(),
        current_state: Some(state.to_string()),
        transitions: BTreeSet::from(["NotifyDoorStatus".to_string()]),
        history_len: 2,
        updated_at: datetime!(2025-01-01 00:00:00 UTC),
    }
}
