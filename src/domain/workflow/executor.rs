//! Workflow executor trait

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::entity::Workflow;
use super::error::WorkflowError;
use super::execution::ExecutionRecord;

/// Runs workflows and records every execution
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    /// Validate the definition and persist a pending record without running it.
    ///
    /// Definition errors are returned here, before any record exists.
    async fn prepare(
        &self,
        workflow: &Workflow,
        initial_input: Map<String, Value>,
    ) -> Result<ExecutionRecord, WorkflowError>;

    /// Run a prepared record until it reaches a terminal status.
    ///
    /// `cancel` is checked between steps only.
    async fn run(
        &self,
        workflow: &Workflow,
        record: ExecutionRecord,
        cancel: CancellationToken,
    ) -> Result<ExecutionRecord, WorkflowError>;

    /// Prepare and run in one call
    async fn execute(
        &self,
        workflow: &Workflow,
        initial_input: Map<String, Value>,
    ) -> Result<ExecutionRecord, WorkflowError> {
        let record = self.prepare(workflow, initial_input).await?;
        self.run(workflow, record, CancellationToken::new()).await
    }
}
