//! Starting, replaying and resuming runs.

use std::collections::HashMap;
use std::sync::Arc;

use common::RunId;
use history::{HistoryStore, Version};
use serde::Serialize;
use serde_json::Value;

use crate::context::{HistoryRecorder, WorkflowContext};
use crate::dispatch::ActivityDispatcher;
use crate::error::{WorkflowError, WorkflowFailure};
use crate::events::{self, WorkflowEvent};
use crate::options::ActivityOptions;
use crate::run::{RunStatus, WorkflowRun};
use crate::workflow::{ErasedWorkflow, Workflow};

struct Registration {
    task_queue: String,
    options: ActivityOptions,
    workflow: Arc<dyn ErasedWorkflow>,
}

/// Runs registered workflows against a history store.
///
/// A run's history is the source of truth: running a run that already has
/// a recorded outcome returns that outcome, and running an unfinished one
/// replays recorded activity outcomes and dispatches only what is missing.
pub struct Engine<S: HistoryStore + Clone + 'static> {
    history: S,
    dispatcher: Arc<dyn ActivityDispatcher>,
    workflows: HashMap<&'static str, Registration>,
}

impl<S: HistoryStore + Clone + 'static> Engine<S> {
    pub fn new(history: S, dispatcher: Arc<dyn ActivityDispatcher>) -> Self {
        Self {
            history,
            dispatcher,
            workflows: HashMap::new(),
        }
    }

    /// Registers a workflow on a task queue. Its activities use `options`.
    pub fn register_workflow<W: Workflow>(
        &mut self,
        task_queue: impl Into<String>,
        workflow: W,
        options: ActivityOptions,
    ) -> &mut Self {
        let name = workflow.name();
        self.workflows.insert(
            name,
            Registration {
                task_queue: task_queue.into(),
                options,
                workflow: Arc::new(workflow),
            },
        );
        self
    }

    pub fn history(&self) -> &S {
        &self.history
    }

    pub fn is_registered(&self, workflow_type: &str) -> bool {
        self.workflows.contains_key(workflow_type)
    }

    fn registration(&self, workflow_type: &str) -> Result<&Registration, WorkflowError> {
        self.workflows
            .get(workflow_type)
            .ok_or_else(|| WorkflowError::NotRegistered(workflow_type.to_string()))
    }

    /// Records a new run. The run does not execute until [`Engine::run_workflow`].
    #[tracing::instrument(skip(self, input))]
    pub async fn start_workflow<I: Serialize + ?Sized>(
        &self,
        workflow_type: &str,
        input: &I,
    ) -> Result<RunId, WorkflowError> {
        let registration = self.registration(workflow_type)?;
        let run_id = RunId::new();
        let input = serde_json::to_value(input)?;

        let recorder = HistoryRecorder::new(
            Arc::new(self.history.clone()),
            run_id,
            workflow_type,
            Version::initial(),
        );
        recorder
            .record(&WorkflowEvent::workflow_started(
                workflow_type,
                &registration.task_queue,
                input,
            ))
            .await?;

        metrics::counter!("engine_workflow_runs_total", "workflow" => workflow_type.to_string())
            .increment(1);
        tracing::info!(%run_id, task_queue = %registration.task_queue, "workflow started");
        Ok(run_id)
    }

    /// Loads a run's current state, or None if it has no history.
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<WorkflowRun>, WorkflowError> {
        let records = self.history.read_run(run_id).await?;
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(WorkflowRun::from_history(&records)?))
    }

    /// Drives a run to its outcome.
    ///
    /// Business failures and unhandled activity failures are recorded as the
    /// run's failure and returned as [`WorkflowError::Failed`]. Any other error
    /// leaves the run open so a later call can resume it.
    #[tracing::instrument(skip(self))]
    pub async fn run_workflow(&self, run_id: RunId) -> Result<Value, WorkflowError> {
        let run = self
            .get_run(run_id)
            .await?
            .ok_or(WorkflowError::RunNotFound(run_id))?;

        match run.status() {
            RunStatus::Completed => return Ok(run.result().cloned().unwrap_or_default()),
            RunStatus::Failed => {
                let failure = run.failure().cloned().unwrap_or_else(|| {
                    WorkflowFailure::new("Unknown", "run failed without a recorded failure")
                });
                return Err(WorkflowError::Failed(failure));
            }
            RunStatus::NotStarted | RunStatus::Running => {}
        }

        let registration = self.registration(run.workflow_type())?;
        let recorder = Arc::new(HistoryRecorder::new(
            Arc::new(self.history.clone()),
            run_id,
            run.workflow_type(),
            run.version(),
        ));
        let input = run.input().clone();
        if run.activities().next().is_some() {
            tracing::info!(in_flight = run.in_flight(), "replaying run from history");
        }
        let ctx = WorkflowContext::new(
            run_id,
            run,
            Arc::clone(&recorder),
            Arc::clone(&self.dispatcher),
            registration.options.clone(),
        );

        let started = std::time::Instant::now();
        let outcome = registration.workflow.execute_json(&ctx, input).await;
        metrics::histogram!("engine_workflow_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let failure = match outcome {
            Ok(result) => {
                recorder
                    .record(&WorkflowEvent::workflow_completed(result.clone()))
                    .await?;
                tracing::info!("workflow completed");
                return Ok(result);
            }
            Err(WorkflowError::Failed(failure)) => failure,
            Err(WorkflowError::Activity(failure)) => WorkflowFailure::from(failure),
            Err(err) => {
                tracing::error!(error = %err, "workflow task failed, run left open");
                return Err(err);
            }
        };

        recorder
            .record(&WorkflowEvent::workflow_failed(failure.clone()))
            .await?;
        tracing::warn!(kind = %failure.kind, message = %failure.message, "workflow failed");
        Err(WorkflowError::Failed(failure))
    }

    /// Resumes every run that has no recorded outcome.
    ///
    /// Returns the ids of the runs it resumed. A run that fails again with an
    /// infrastructure error is logged and stays open.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<Vec<RunId>, WorkflowError> {
        let mut resumed = Vec::new();
        for record in self.history.records_by_type(events::WORKFLOW_STARTED).await? {
            let run_id = record.run_id;
            let Some(run) = self.get_run(run_id).await? else {
                continue;
            };
            if run.status().is_terminal() || !self.is_registered(run.workflow_type()) {
                continue;
            }

            tracing::info!(%run_id, "resuming unfinished run");
            match self.run_workflow(run_id).await {
                Ok(_) => {}
                Err(err) if err.is_run_outcome() => {}
                Err(err) => tracing::error!(%run_id, error = %err, "failed to resume run"),
            }
            resumed.push(run_id);
        }
        Ok(resumed)
    }
}
