//! Routing activity tasks to workers and applying the retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::RunId;
use serde_json::Value;

use crate::activity::{ActivityContext, ActivityRegistry};
use crate::error::{ActivityError, ActivityFailure};
use crate::options::ActivityOptions;

/// One activity invocation requested by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTask {
    pub run_id: RunId,
    /// Position of the activity in the run's dispatch order.
    pub seq: u64,
    pub task_queue: String,
    pub activity_type: String,
    pub args: Value,
}

/// Delivers a single attempt of an activity task to whoever executes it.
#[async_trait]
pub trait ActivityDispatcher: Send + Sync {
    async fn dispatch(&self, task: &ActivityTask, attempt: u32) -> Result<Value, ActivityError>;
}

/// In-process dispatcher routing tasks to the registry serving their queue.
#[derive(Debug, Clone, Default)]
pub struct TaskQueueRouter {
    workers: HashMap<String, Arc<ActivityRegistry>>,
}

impl TaskQueueRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a task queue with a registry, replacing any previous worker.
    pub fn serve(&mut self, task_queue: impl Into<String>, registry: ActivityRegistry) -> &mut Self {
        self.workers.insert(task_queue.into(), Arc::new(registry));
        self
    }

    /// Returns the served task queues, sorted.
    pub fn task_queues(&self) -> Vec<&str> {
        let mut queues: Vec<&str> = self.workers.keys().map(String::as_str).collect();
        queues.sort_unstable();
        queues
    }
}

#[async_trait]
impl ActivityDispatcher for TaskQueueRouter {
    async fn dispatch(&self, task: &ActivityTask, attempt: u32) -> Result<Value, ActivityError> {
        let registry = self
            .workers
            .get(&task.task_queue)
            .ok_or_else(|| ActivityError::UnknownTaskQueue(task.task_queue.clone()))?;
        let handler =
            registry
                .get(&task.activity_type)
                .ok_or_else(|| ActivityError::NotRegistered {
                    activity_type: task.activity_type.clone(),
                    task_queue: task.task_queue.clone(),
                })?;

        let ctx = ActivityContext {
            run_id: task.run_id,
            activity_type: task.activity_type.clone(),
            task_queue: task.task_queue.clone(),
            attempt,
        };
        handler.execute(ctx, task.args.clone()).await
    }
}

/// Runs a task until it succeeds or the retry policy is exhausted.
///
/// Every attempt is bounded by the start-to-close timeout. Returns the
/// result and the number of attempts it took.
#[tracing::instrument(
    skip(dispatcher, task, options),
    fields(run_id = %task.run_id, seq = task.seq, activity = %task.activity_type)
)]
pub async fn invoke_with_policy(
    dispatcher: &dyn ActivityDispatcher,
    task: &ActivityTask,
    options: &ActivityOptions,
) -> Result<(Value, u32), ActivityFailure> {
    let policy = &options.retry_policy;
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        metrics::counter!("engine_activity_attempts_total", "activity" => task.activity_type.clone())
            .increment(1);

        let outcome = match tokio::time::timeout(
            options.start_to_close_timeout,
            dispatcher.dispatch(task, attempt),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ActivityError::Timeout(options.start_to_close_timeout)),
        };

        match outcome {
            Ok(result) => return Ok((result, attempt)),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(attempt, error = %err, ?delay, "activity attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                metrics::counter!("engine_activity_failures_total", "activity" => task.activity_type.clone())
                    .increment(1);
                tracing::warn!(attempt, error = %err, "activity failed");
                return Err(ActivityFailure {
                    activity_type: task.activity_type.clone(),
                    attempts: attempt,
                    reason: err.to_string(),
                });
            }
        }
    }
}
