//! Feeds history records to projections.

use futures_util::StreamExt;
use history::HistoryStore;

use crate::Result;
use crate::projection::Projection;

/// Processes records from a history store and delivers them to projections.
///
/// - Catch-up: replays all records so projections reach the store's head
/// - Rebuild: resets all projections and replays from scratch
pub struct ProjectionProcessor<S: HistoryStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: HistoryStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams every record and delivers it to each projection that has not
    /// seen it yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut stream = self.store.stream_all().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(record) = stream.next().await {
            let record = record?;
            index += 1;

            for projection in &self.projections {
                if projection.position().await.records_processed < index {
                    projection.handle(&record).await?;
                    delivered += 1;
                }
            }
        }

        metrics::counter!("projections_records_processed").increment(delivered);
        tracing::debug!(records = index, delivered, "catch-up complete");
        Ok(())
    }

    /// Resets all projections and replays all records from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
