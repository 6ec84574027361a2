//! Append-only, sequence-ordered record storage and filtered queries.
//!
//! A [`RecordStore`] has exactly one writer (the tracking participant or a
//! test harness) and any number of readers. Queries are expressed as a
//! [`RecordQuery`] and return lazy iterators in ascending sequence order;
//! the iterators are `Clone`, so a query can be restarted from the top.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{QueryError, TrackingError};
use crate::record::{InstanceState, TraceRecord};

/// A record store shared between its single writer and its readers.
pub type SharedRecordStore = Arc<RwLock<RecordStore>>;

/// Ordered collection of trace records.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<TraceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped for sharing.
    pub fn shared() -> SharedRecordStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Append a record.
    ///
    /// The record's sequence number must be strictly greater than the last
    /// appended one; otherwise the record is rejected and the store is unchanged.
    pub fn append(&mut self, record: TraceRecord) -> Result<(), TrackingError> {
        if let Some(last) = self.last_sequence() {
            if record.sequence_number <= last {
                return Err(TrackingError::OutOfOrderUpdate {
                    last,
                    received: record.sequence_number,
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.records.last().map(|r| r.sequence_number)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[TraceRecord] {
        &self.records
    }

    /// All records that match `query`, lazily, in sequence order.
    pub fn query(&self, query: &RecordQuery) -> impl Iterator<Item = &TraceRecord> + Clone + '_ {
        // Records are sorted by sequence number, so the start cursor is a
        // binary search rather than a scan.
        let start = self
            .records
            .partition_point(|r| r.sequence_number < query.start_sequence);
        let query = query.clone();
        self.records[start..].iter().filter(move |r| query.matches(r))
    }

    /// Records emitted by the named activity, in any state.
    pub fn records_for<'a>(
        &'a self,
        activity_name: &'a str,
    ) -> impl Iterator<Item = &'a TraceRecord> + Clone + 'a {
        self.records
            .iter()
            .filter(move |r| r.activity_name == activity_name)
    }

    pub fn count(&self, query: &RecordQuery) -> usize {
        self.query(query).count()
    }

    /// The first record matching `query`.
    pub fn first(&self, query: &RecordQuery) -> Result<&TraceRecord, QueryError> {
        self.query(query).next().ok_or_else(|| QueryError::NotFound {
            query: query.to_string(),
        })
    }

    /// The last record matching `query`.
    pub fn last(&self, query: &RecordQuery) -> Result<&TraceRecord, QueryError> {
        self.query(query).last().ok_or_else(|| QueryError::NotFound {
            query: query.to_string(),
        })
    }

    /// The only record matching `query`.
    pub fn single(&self, query: &RecordQuery) -> Result<&TraceRecord, QueryError> {
        let mut matches = self.query(query);
        let first = matches.next().ok_or_else(|| QueryError::NotFound {
            query: query.to_string(),
        })?;
        let extra = matches.count();
        if extra > 0 {
            return Err(QueryError::MultipleMatches {
                query: query.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }
}

impl TryFrom<Vec<TraceRecord>> for RecordStore {
    type Error = TrackingError;

    /// Append `records` in order; the first one out of sequence fails the
    /// whole conversion.
    fn try_from(records: Vec<TraceRecord>) -> Result<Self, Self::Error> {
        let mut store = RecordStore::new();
        for record in records {
            store.append(record)?;
        }
        Ok(store)
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a TraceRecord;
    type IntoIter = std::slice::Iter<'a, TraceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A named argument or variable the record must carry, optionally with a value.
#[derive(Debug, Clone, PartialEq)]
struct SnapshotPredicate {
    name: String,
    value: Option<Value>,
}

impl SnapshotPredicate {
    fn matches(&self, snapshot: &std::collections::BTreeMap<String, Value>) -> bool {
        match (snapshot.get(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(stored), Some(expected)) => stored == expected,
        }
    }
}

/// Filter over a [`RecordStore`]. All set criteria must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    activity_name: Option<String>,
    state: Option<InstanceState>,
    activity_id: Option<String>,
    start_sequence: u64,
    arguments: Vec<SnapshotPredicate>,
    variables: Vec<SnapshotPredicate>,
}

impl RecordQuery {
    /// A query that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the most common query: a named activity reaching `Closed`.
    pub fn closed(activity_name: impl Into<String>) -> Self {
        Self::new()
            .activity(activity_name)
            .state(InstanceState::Closed)
    }

    pub fn activity(mut self, name: impl Into<String>) -> Self {
        self.activity_name = Some(name.into());
        self
    }

    pub fn state(mut self, state: InstanceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn activity_id(mut self, id: impl Into<String>) -> Self {
        self.activity_id = Some(id.into());
        self
    }

    /// Exclude records whose sequence number is below `sequence`.
    pub fn starting_at(mut self, sequence: u64) -> Self {
        self.start_sequence = sequence;
        self
    }

    /// Require the record to carry the named argument.
    pub fn with_argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(SnapshotPredicate {
            name: name.into(),
            value: None,
        });
        self
    }

    /// Require the named argument to equal `value`.
    pub fn argument_eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push(SnapshotPredicate {
            name: name.into(),
            value: Some(value.into()),
        });
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(SnapshotPredicate {
            name: name.into(),
            value: None,
        });
        self
    }

    pub fn variable_eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.push(SnapshotPredicate {
            name: name.into(),
            value: Some(value.into()),
        });
        self
    }

    pub fn start_sequence(&self) -> u64 {
        self.start_sequence
    }

    pub fn matches(&self, record: &TraceRecord) -> bool {
        if record.sequence_number < self.start_sequence {
            return false;
        }
        if let Some(name) = &self.activity_name {
            if &record.activity_name != name {
                return false;
            }
        }
        if let Some(state) = self.state {
            if record.state != state {
                return false;
            }
        }
        if let Some(id) = &self.activity_id {
            if record.activity_id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.arguments.iter().all(|p| p.matches(&record.arguments))
            && self.variables.iter().all(|p| p.matches(&record.variables))
    }
}

impl fmt::Display for RecordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.activity_name {
            parts.push(format!("activity '{}'", name));
        }
        if let Some(state) = self.state {
            parts.push(format!("state {}", state));
        }
        if let Some(id) = &self.activity_id {
            parts.push(format!("activity id '{}'", id));
        }
        if self.start_sequence > 0 {
            parts.push(format!("from sequence {}", self.start_sequence));
        }
        for p in &self.arguments {
            parts.push(match &p.value {
                Some(v) => format!("argument {} = {}", p.name, v),
                None => format!("argument {}", p.name),
            });
        }
        for p in &self.variables {
            parts.push(match &p.value {
                Some(v) => format!("variable {} = {}", p.name, v),
                None => format!("variable {}", p.name),
            });
        }
        if parts.is_empty() {
            f.write_str("any record")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn rec(seq: u64, name: &str, state: InstanceState) -> TraceRecord {
        TraceRecord::builder(Uuid::nil(), seq, name, state).build()
    }

    /// A retry loop: Reminder fires twice around an Approve attempt.
    fn store() -> RecordStore {
        let mut s = RecordStore::new();
        s.append(rec(1, "Start", InstanceState::Closed)).unwrap();
        s.append(
            TraceRecord::builder(Uuid::nil(), 2, "Reminder", InstanceState::Closed)
                .argument("Attempt", 1)
                .activity_id("1.2")
                .build(),
        )
        .unwrap();
        s.append(rec(3, "Approve", InstanceState::Executing)).unwrap();
        s.append(rec(4, "Approve", InstanceState::Faulted)).unwrap();
        s.append(
            TraceRecord::builder(Uuid::nil(), 5, "Reminder", InstanceState::Closed)
                .argument("Attempt", 2)
                .variable("Escalated", json!({"to": "manager"}))
                .activity_id("1.2")
                .build(),
        )
        .unwrap();
        s
    }

    #[test]
    fn append_rejects_non_increasing_sequence() {
        let mut s = store();
        let err = s.append(rec(5, "Late", InstanceState::Closed)).unwrap_err();
        assert_eq!(
            err,
            TrackingError::OutOfOrderUpdate {
                last: 5,
                received: 5
            }
        );
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn query_filters_by_name_and_state() {
        let s = store();
        let q = RecordQuery::closed("Reminder");
        let seqs: Vec<u64> = s.query(&q).map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![2, 5]);
        let q = RecordQuery::new().state(InstanceState::Faulted);
        assert_eq!(s.single(&q).unwrap().activity_name, "Approve");
    }

    #[test]
    fn query_is_restartable() {
        let s = store();
        let q = RecordQuery::new().activity("Approve");
        let it = s.query(&q);
        let again = it.clone();
        assert_eq!(it.count(), 2);
        assert_eq!(again.count(), 2);
    }

    #[test]
    fn start_sequence_finds_second_occurrence() {
        let s = store();
        let approve = s.first(&RecordQuery::new().activity("Approve")).unwrap();
        let q = RecordQuery::closed("Reminder").starting_at(approve.sequence_number + 1);
        let second = s.first(&q).unwrap();
        assert_eq!(second.sequence_number, 5);
    }

    #[test]
    fn argument_predicates_use_structural_equality() {
        let s = store();
        assert_eq!(s.count(&RecordQuery::new().with_argument("Attempt")), 2);
        let q = RecordQuery::new().argument_eq("Attempt", 2);
        assert_eq!(s.single(&q).unwrap().sequence_number, 5);
        let q = RecordQuery::new().variable_eq("Escalated", json!({"to": "manager"}));
        assert_eq!(s.single(&q).unwrap().sequence_number, 5);
        let q = RecordQuery::new().argument_eq("Attempt", "2");
        assert_eq!(s.count(&q), 0);
    }

    #[test]
    fn activity_id_filter() {
        let s = store();
        assert_eq!(s.count(&RecordQuery::new().activity_id("1.2")), 2);
        assert_eq!(s.count(&RecordQuery::new().activity_id("9")), 0);
    }

    #[test]
    fn first_last_single_errors() {
        let s = store();
        let missing = RecordQuery::closed("Approve");
        assert!(matches!(s.first(&missing), Err(QueryError::NotFound { .. })));
        assert!(matches!(s.last(&missing), Err(QueryError::NotFound { .. })));
        let many = RecordQuery::closed("Reminder");
        assert_eq!(s.last(&many).unwrap().sequence_number, 5);
        assert_eq!(
            s.single(&many),
            Err(QueryError::MultipleMatches {
                query: "activity 'Reminder', state closed".to_string(),
                count: 2
            })
        );
    }

    #[test]
    fn lookups_accept_a_temporary_query() {
        let s = store();
        assert_eq!(s.first(&RecordQuery::closed("Reminder")).unwrap().sequence_number, 2);
        assert_eq!(s.last(&RecordQuery::closed("Reminder")).unwrap().sequence_number, 5);
        let only = s.single(&RecordQuery::closed("Start")).unwrap();
        assert_eq!(only.activity_name, "Start");
        let found = {
            let q = RecordQuery::new().activity("Approve");
            s.first(&q).unwrap()
        };
        assert_eq!(found.sequence_number, 3);
    }

    #[test]
    fn try_from_keeps_ordered_records() {
        let s = RecordStore::try_from(vec![
            rec(1, "A", InstanceState::Closed),
            rec(2, "B", InstanceState::Closed),
            rec(3, "C", InstanceState::Closed),
        ])
        .unwrap();
        let names: Vec<&str> = s.iter().map(|r| r.activity_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn try_from_rejects_duplicate_and_reordered_sequences() {
        let err = RecordStore::try_from(vec![
            rec(1, "A", InstanceState::Closed),
            rec(1, "B", InstanceState::Closed),
            rec(0, "C", InstanceState::Closed),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TrackingError::OutOfOrderUpdate {
                last: 1,
                received: 1
            }
        );
    }
}
