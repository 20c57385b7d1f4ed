use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    HistoryError, HistoryRecord, Result, RunId, Version,
    store::{AppendOptions, HistoryStore, RecordStream, validate_records_for_append},
};

/// In-memory history store.
///
/// Keeps every record in insertion order. Cloning shares the same
/// underlying storage, so a clone handed to the engine and one kept by a
/// projection observe the same history.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl InMemoryHistoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

fn current_version(records: &[HistoryRecord], run_id: RunId) -> Version {
    records
        .iter()
        .filter(|r| r.run_id == run_id)
        .map(|r| r.version)
        .max()
        .unwrap_or(Version::initial())
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, records: Vec<HistoryRecord>, options: AppendOptions) -> Result<Version> {
        validate_records_for_append(&records)?;

        let first = &records[0];
        let run_id = first.run_id;

        let mut store = self.records.write().await;
        let current = current_version(&store, run_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(HistoryError::ConcurrencyConflict {
                run_id,
                expected,
                actual: current,
            });
        }

        // Without an expected version the batch must still continue the run.
        if first.version != current.next() {
            return Err(HistoryError::ConcurrencyConflict {
                run_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let last_version = records.last().map(|r| r.version).unwrap_or(current);
        metrics::counter!("history_records_appended_total").increment(records.len() as u64);
        store.extend(records);

        Ok(last_version)
    }

    async fn read_run(&self, run_id: RunId) -> Result<Vec<HistoryRecord>> {
        let store = self.records.read().await;
        let mut records: Vec<_> = store.iter().filter(|r| r.run_id == run_id).cloned().collect();
        records.sort_by_key(|r| r.version);
        Ok(records)
    }

    async fn records_by_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>> {
        let store = self.records.read().await;
        Ok(store
            .iter()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all(&self) -> Result<RecordStream> {
        use futures_util::stream;

        let records = self.records.read().await.clone();
        let stream = stream::iter(records.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn run_version(&self, run_id: RunId) -> Result<Option<Version>> {
        let store = self.records.read().await;
        Ok(store
            .iter()
            .filter(|r| r.run_id == run_id)
            .map(|r| r.version)
            .max())
    }
}
