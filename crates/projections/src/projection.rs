//! Core projection trait and position tracking.

use async_trait::async_trait;
use history::HistoryRecord;

use crate::Result;

/// Tracks how many history records a projection has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub records_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Advances the position by one record.
    pub fn advance(&self) -> Self {
        Self {
            records_processed: self.records_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.records_processed)
    }
}

/// Turns history records into a read model.
///
/// `handle` receives every record in store order, including records of
/// workflows the projection does not care about; it must still advance its
/// position for those.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, record: &HistoryRecord) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
