use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{HistoryError, HistoryRecord, Result, RunId, Version};

/// Options for appending records to a run's history.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected version of the run for optimistic concurrency control.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the run to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the run to have no history yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of history records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<HistoryRecord>> + Send>>;

/// Storage for run histories.
///
/// Implementations must be thread-safe; the engine appends from several
/// concurrently completing activities of the same run.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends records to a run's history.
    ///
    /// Records are appended atomically - either all succeed or none do.
    /// If `options.expected_version` is set, the operation fails with
    /// `ConcurrencyConflict` when the current version doesn't match.
    ///
    /// Returns the run's version after appending.
    async fn append(&self, records: Vec<HistoryRecord>, options: AppendOptions) -> Result<Version>;

    /// Reads a run's full history in version order.
    async fn read_run(&self, run_id: RunId) -> Result<Vec<HistoryRecord>>;

    /// Retrieves records of one event type across all runs.
    async fn records_by_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>>;

    /// Streams every record in the store in insertion order.
    async fn stream_all(&self) -> Result<RecordStream>;

    /// Gets the current version of a run, or None if it has no history.
    async fn run_version(&self, run_id: RunId) -> Result<Option<Version>>;
}

/// Validates a batch of records before appending.
pub fn validate_records_for_append(records: &[HistoryRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Err(HistoryError::InvalidAppend(
            "Cannot append empty record list".to_string(),
        ));
    };

    for record in records.iter().skip(1) {
        if record.run_id != first.run_id {
            return Err(HistoryError::InvalidAppend(
                "All records must belong to the same run".to_string(),
            ));
        }
        if record.workflow_type != first.workflow_type {
            return Err(HistoryError::InvalidAppend(
                "All records must have the same workflow type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for record in records.iter().skip(1) {
        expected_version = expected_version.next();
        if record.version != expected_version {
            return Err(HistoryError::InvalidAppend(format!(
                "Record versions must be sequential. Expected {}, got {}",
                expected_version, record.version
            )));
        }
    }

    Ok(())
}
