//! Durable workflow execution.
//!
//! This crate runs workflow code against a [`history::HistoryStore`]:
//! - [`RemoteOperation`] names a remote activity and fixes its input/output types
//! - [`ActivityOptions`] / [`RetryPolicy`] bound every invocation in time and attempts
//! - [`ActivityRegistry`] and [`TaskQueueRouter`] serve activities on named task queues
//! - [`WorkflowContext`] hands out one future per dispatched activity and records
//!   every scheduling decision and outcome as a [`WorkflowEvent`]
//! - [`Engine`] starts runs, replays them from history and resumes unfinished ones
//!
//! Workflow code must be deterministic: it may only branch on values returned
//! by the context, because a resumed run re-executes it against recorded outcomes.

pub mod activity;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod operation;
pub mod options;
pub mod run;
pub mod workflow;

pub use activity::{ActivityContext, ActivityHandler, ActivityRegistry};
pub use context::{ActivityHandle, WorkflowContext};
pub use dispatch::{ActivityDispatcher, ActivityTask, TaskQueueRouter};
pub use engine::Engine;
pub use error::{ActivityError, ActivityFailure, WorkflowError, WorkflowFailure};
pub use events::WorkflowEvent;
pub use operation::RemoteOperation;
pub use options::{ActivityOptions, RetryPolicy};
pub use run::{ActivityOutcome, ActivityRecord, RunStatus, WorkflowRun};
pub use workflow::Workflow;
