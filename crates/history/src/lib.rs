//! Durable run history.
//!
//! Every workflow run is recorded as an ordered, versioned sequence of
//! [`HistoryRecord`]s. The execution engine replays a run from this history
//! after a restart, so records are only ever appended, never rewritten.
//!
//! Two stores are provided: [`InMemoryHistoryStore`] for tests and
//! single-process use, and [`PostgresHistoryStore`], which survives restarts.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::RunId;
pub use error::{HistoryError, Result};
pub use memory::InMemoryHistoryStore;
pub use postgres::PostgresHistoryStore;
pub use record::{EventId, HistoryRecord, HistoryRecordBuilder, Version};
pub use store::{AppendOptions, HistoryStore, RecordStream};
