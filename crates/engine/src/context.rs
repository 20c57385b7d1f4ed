//! The handle workflow code uses to dispatch activities.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::RunId;
use history::{AppendOptions, HistoryRecord, HistoryStore, Version};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::dispatch::{ActivityDispatcher, ActivityTask, invoke_with_policy};
use crate::error::WorkflowError;
use crate::events::WorkflowEvent;
use crate::operation::RemoteOperation;
use crate::options::ActivityOptions;
use crate::run::{ActivityOutcome, WorkflowRun};

/// Pending result of one dispatched activity.
pub type ActivityHandle<O> = Pin<Box<dyn Future<Output = Result<O, WorkflowError>> + Send>>;

/// Appends events to one run's history, serializing concurrent writers.
pub(crate) struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    run_id: RunId,
    workflow_type: String,
    version: Mutex<Version>,
}

impl HistoryRecorder {
    pub(crate) fn new(
        store: Arc<dyn HistoryStore>,
        run_id: RunId,
        workflow_type: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            store,
            run_id,
            workflow_type: workflow_type.into(),
            version: Mutex::new(version),
        }
    }

    pub(crate) async fn record(&self, event: &WorkflowEvent) -> Result<Version, WorkflowError> {
        let mut version = self.version.lock().await;
        let record = HistoryRecord::builder()
            .event_type(event.event_type())
            .run_id(self.run_id)
            .workflow_type(self.workflow_type.clone())
            .version(version.next())
            .payload(event)?
            .build();
        *version = self
            .store
            .append(vec![record], AppendOptions::expect_version(*version))
            .await?;
        Ok(*version)
    }
}

/// Per-run context handed to workflow code.
///
/// Each call to [`WorkflowContext::execute`] takes the next sequence number
/// immediately, before the returned future is polled, so a run that creates
/// its activity futures in a fixed order numbers them identically on every
/// replay, whatever order they later complete in.
#[derive(Clone)]
pub struct WorkflowContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    run_id: RunId,
    replay: WorkflowRun,
    recorder: Arc<HistoryRecorder>,
    dispatcher: Arc<dyn ActivityDispatcher>,
    options: ActivityOptions,
    sequence: AtomicU64,
}

impl WorkflowContext {
    pub(crate) fn new(
        run_id: RunId,
        replay: WorkflowRun,
        recorder: Arc<HistoryRecorder>,
        dispatcher: Arc<dyn ActivityDispatcher>,
        options: ActivityOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                run_id,
                replay,
                recorder,
                dispatcher,
                options,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.inner.run_id
    }

    pub fn workflow_type(&self) -> &str {
        self.inner.replay.workflow_type()
    }

    /// Options applied by [`WorkflowContext::execute`].
    pub fn activity_options(&self) -> &ActivityOptions {
        &self.inner.options
    }

    /// Returns true while the next dispatch is already in the history.
    pub fn is_replaying(&self) -> bool {
        let next = self.inner.sequence.load(Ordering::SeqCst) + 1;
        self.inner.replay.activity(next).is_some()
    }

    /// Dispatches an activity with the run's default options.
    pub fn execute<I, O>(&self, operation: &RemoteOperation<I, O>, args: I) -> ActivityHandle<O>
    where
        I: Serialize,
        O: DeserializeOwned + Send + 'static,
    {
        self.execute_with_options(operation, args, self.inner.options.clone())
    }

    /// Dispatches an activity with explicit options.
    ///
    /// During replay a recorded outcome is returned without dispatching.
    /// An activity that was scheduled but never finished is dispatched again.
    pub fn execute_with_options<I, O>(
        &self,
        operation: &RemoteOperation<I, O>,
        args: I,
        options: ActivityOptions,
    ) -> ActivityHandle<O>
    where
        I: Serialize,
        O: DeserializeOwned + Send + 'static,
    {
        let seq = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let activity_type = operation.name();
        let args = operation.encode_args(&args);

        Box::pin(async move {
            let result = inner.run_activity(seq, activity_type, args?, options).await?;
            Ok(serde_json::from_value::<O>(result)?)
        })
    }
}

impl ContextInner {
    async fn run_activity(
        &self,
        seq: u64,
        activity_type: &'static str,
        args: Value,
        options: ActivityOptions,
    ) -> Result<Value, WorkflowError> {
        if let Some(recorded) = self.replay.activity(seq) {
            if recorded.activity_type != activity_type || recorded.args != args {
                return Err(WorkflowError::NonDeterminism(format!(
                    "activity #{seq}: history has '{}' with {}, workflow requested '{}' with {}",
                    recorded.activity_type, recorded.args, activity_type, args
                )));
            }
            match &recorded.outcome {
                Some(ActivityOutcome::Completed { result, .. }) => return Ok(result.clone()),
                Some(ActivityOutcome::Failed(failure)) => {
                    return Err(WorkflowError::Activity(failure.clone()));
                }
                None => {
                    tracing::info!(seq, activity = activity_type, "re-dispatching in-flight activity");
                }
            }
        } else {
            let scheduled =
                WorkflowEvent::activity_scheduled(seq, activity_type, &options.task_queue, args.clone());
            self.recorder.record(&scheduled).await?;
        }

        let task = ActivityTask {
            run_id: self.run_id,
            seq,
            task_queue: options.task_queue.clone(),
            activity_type: activity_type.to_string(),
            args,
        };

        match invoke_with_policy(self.dispatcher.as_ref(), &task, &options).await {
            Ok((result, attempts)) => {
                self.recorder
                    .record(&WorkflowEvent::activity_completed(seq, result.clone(), attempts))
                    .await?;
                Ok(result)
            }
            Err(failure) => {
                self.recorder
                    .record(&WorkflowEvent::activity_failed(seq, failure.clone()))
                    .await?;
                Err(WorkflowError::Activity(failure))
            }
        }
    }
}
