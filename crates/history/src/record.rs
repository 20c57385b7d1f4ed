use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RunId;

/// Unique identifier for a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a record within its run's history.
///
/// An empty history is at version 0; the first record is version 1 and each
/// later record increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of an empty history (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version of the first record (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded fact in a run's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique identifier for this record.
    pub event_id: EventId,

    /// The type of the recorded event (e.g., "ActivityScheduled").
    pub event_type: String,

    /// The run this record belongs to.
    pub run_id: RunId,

    /// The workflow type of the run (e.g., "book-trip").
    pub workflow_type: String,

    /// The version of the run's history after this record.
    pub version: Version,

    /// When the record was written.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl HistoryRecord {
    /// Creates a new history record builder.
    pub fn builder() -> HistoryRecordBuilder {
        HistoryRecordBuilder::default()
    }
}

/// Builder for history records.
#[derive(Debug, Default)]
pub struct HistoryRecordBuilder {
    event_type: Option<String>,
    run_id: Option<RunId>,
    workflow_type: Option<String>,
    version: Option<Version>,
    payload: Option<serde_json::Value>,
}

impl HistoryRecordBuilder {
    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the run ID.
    pub fn run_id(mut self, id: RunId) -> Self {
        self.run_id = Some(id);
        self
    }

    /// Sets the workflow type.
    pub fn workflow_type(mut self, workflow_type: impl Into<String>) -> Self {
        self.workflow_type = Some(workflow_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the record with a fresh id, stamped with the current time.
    ///
    /// # Panics
    ///
    /// Panics if required fields (event_type, run_id, workflow_type, version, payload)
    /// are not set.
    pub fn build(self) -> HistoryRecord {
        HistoryRecord {
            event_id: EventId::new(),
            event_type: self.event_type.expect("event_type is required"),
            run_id: self.run_id.expect("run_id is required"),
            workflow_type: self.workflow_type.expect("workflow_type is required"),
            version: self.version.expect("version is required"),
            timestamp: Utc::now(),
            payload: self.payload.expect("payload is required"),
        }
    }
}
