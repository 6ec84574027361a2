use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TrackingError;

/// Execution lifecycle state of an activity at the moment a record was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Executing,
    Closed,
    Canceled,
    Faulted,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Executing => "executing",
            InstanceState::Closed => "closed",
            InstanceState::Canceled => "canceled",
            InstanceState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "executing" => Ok(InstanceState::Executing),
            "closed" => Ok(InstanceState::Closed),
            "canceled" | "cancelled" => Ok(InstanceState::Canceled),
            "faulted" => Ok(InstanceState::Faulted),
            other => Err(format!(
                "unknown instance state '{}' (expected executing, closed, canceled, or faulted)",
                other
            )),
        }
    }
}

/// One immutable observation of an activity's execution-state transition.
///
/// Records are emitted by the host in sequence-number order and never
/// modified after they are appended to a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub sequence_number: u64,
    pub instance_id: Uuid,
    pub activity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub state: InstanceState,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TraceRecord {
    /// Start building a record with empty argument and variable snapshots,
    /// stamped with the current UTC time.
    pub fn builder(
        instance_id: Uuid,
        sequence_number: u64,
        activity_name: impl Into<String>,
        state: InstanceState,
    ) -> TraceRecordBuilder {
        TraceRecordBuilder {
            record: TraceRecord {
                sequence_number,
                instance_id,
                activity_name: activity_name.into(),
                activity_id: None,
                state,
                arguments: BTreeMap::new(),
                variables: BTreeMap::new(),
                timestamp: OffsetDateTime::now_utc(),
            },
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == InstanceState::Closed
    }

    /// Read a named argument snapshot as `T`.
    ///
    /// Returns `Ok(None)` when the record does not carry the argument.
    pub fn argument<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TrackingError> {
        read_snapshot(&self.arguments, name)
    }

    /// Read a named variable snapshot as `T`.
    pub fn variable<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TrackingError> {
        read_snapshot(&self.variables, name)
    }
}

fn read_snapshot<T: DeserializeOwned>(
    values: &BTreeMap<String, Value>,
    name: &str,
) -> Result<Option<T>, TrackingError> {
    match values.get(name) {
        None => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| TrackingError::ArgumentType {
                name: name.to_string(),
                message: e.to_string(),
            }),
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}]",
            self.sequence_number, self.activity_name, self.state
        )?;
        if let Some(id) = &self.activity_id {
            write!(f, " id={}", id)?;
        }
        Ok(())
    }
}

/// Builder for [`TraceRecord`].
#[derive(Debug, Clone)]
pub struct TraceRecordBuilder {
    record: TraceRecord,
}

impl TraceRecordBuilder {
    pub fn activity_id(mut self, id: impl Into<String>) -> Self {
        self.record.activity_id = Some(id.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record.arguments.insert(name.into(), value.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record.variables.insert(name.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    pub fn build(self) -> TraceRecord {
        self.record
    }
}
