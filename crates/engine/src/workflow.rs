//! Workflow definitions.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::error::WorkflowError;

/// Deterministic orchestration code run by the engine.
///
/// `execute` may be re-run from the start against recorded history, so it
/// must only make decisions based on its input and on values returned by
/// the context.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    /// Workflow type name used to start runs.
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        ctx: &WorkflowContext,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError>;
}

/// A workflow with its input and output erased to JSON.
#[async_trait]
pub(crate) trait ErasedWorkflow: Send + Sync {
    async fn execute_json(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, WorkflowError>;
}

#[async_trait]
impl<W: Workflow> ErasedWorkflow for W {
    async fn execute_json(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, WorkflowError> {
        let input: W::Input = serde_json::from_value(input)?;
        let output = self.execute(ctx, input).await?;
        Ok(serde_json::to_value(output)?)
    }
}
