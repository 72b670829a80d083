//! Execution orchestrator: runs a workflow's steps in order and keeps the
//! execution record persisted after every state change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::step_runner::StepRunner;
use crate::config::EngineConfig;
use crate::domain::{
    CompletionProvider, ExecutionRecord, Storage, StepStatus, Workflow, WorkflowError,
    WorkflowExecutor,
};
use crate::infrastructure::observability::{record_execution, record_step};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per provider call
    pub step_timeout_ms: u64,

    /// Smallest workflow that may execute (never below 1)
    pub min_steps: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 60_000,
            min_steps: 1,
        }
    }
}

impl From<&EngineConfig> for OrchestratorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            step_timeout_ms: config.step_timeout_ms,
            min_steps: config.min_steps,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionOrchestrator {
    runner: StepRunner,
    executions: Arc<dyn Storage<ExecutionRecord>>,
    config: OrchestratorConfig,
}

impl ExecutionOrchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        executions: Arc<dyn Storage<ExecutionRecord>>,
    ) -> Self {
        Self::with_config(provider, executions, OrchestratorConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn CompletionProvider>,
        executions: Arc<dyn Storage<ExecutionRecord>>,
        config: OrchestratorConfig,
    ) -> Self {
        let runner = StepRunner::new(provider, Duration::from_millis(config.step_timeout_ms));
        Self {
            runner,
            executions,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn persist(&self, record: &ExecutionRecord) -> Result<(), WorkflowError> {
        self.executions
            .save(record.clone())
            .await
            .map(|_| ())
            .map_err(|e| WorkflowError::persistence(e.to_string()))
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        mut record: ExecutionRecord,
        cancel: CancellationToken,
    ) -> Result<ExecutionRecord, WorkflowError> {
        record.mark_running()?;
        self.persist(&record).await?;

        for step in workflow.steps() {
            let order = step.order();

            if cancel.is_cancelled() {
                info!(step = order, "Execution cancelled");
                record.skip_remaining(order)?;
                record.mark_failed(order, WorkflowError::Cancelled(order).to_string())?;
                break;
            }

            let pending = record
                .step_result(order)
                .cloned()
                .ok_or_else(|| WorkflowError::step_not_found(step.id().as_str()))?;
            let outputs = record.step_outputs();

            debug!(step = order, step_id = %step.id(), "Running step");
            let running = self
                .runner
                .start(step, pending, record.initial_input(), &outputs)?;
            record.start_step(running.clone())?;
            self.persist(&record).await?;

            let result = self.runner.complete(step, running).await?;

            record_step(result.status(), result.duration_ms().map(Duration::from_millis));
            let failure = (result.status() == StepStatus::Failed)
                .then(|| result.error().unwrap_or("unknown error").to_string());

            record.record_step(result)?;

            if let Some(reason) = failure {
                warn!(step = order, error = %reason, "Step failed");
                record.skip_remaining(order + 1)?;
                record.mark_failed(order, WorkflowError::step_execution(order, reason).to_string())?;
                break;
            }

            self.persist(&record).await?;
        }

        if !record.is_terminal() {
            record.mark_completed()?;
        }
        self.persist(&record).await?;

        record_execution(
            record.status(),
            Duration::from_millis(record.duration_ms().unwrap_or_default()),
            record.total_tokens(),
            record.total_cost_micros(),
        );
        info!(
            status = %record.status(),
            total_tokens = record.total_tokens(),
            cost_micros = record.total_cost_micros(),
            duration_ms = record.duration_ms().unwrap_or_default(),
            "Execution finished"
        );

        Ok(record)
    }
}

#[async_trait]
impl WorkflowExecutor for ExecutionOrchestrator {
    async fn prepare(
        &self,
        workflow: &Workflow,
        initial_input: Map<String, Value>,
    ) -> Result<ExecutionRecord, WorkflowError> {
        workflow.validate_for_execution(self.config.min_steps)?;

        let record = ExecutionRecord::new(workflow, initial_input);
        self.executions
            .create(record.clone())
            .await
            .map_err(|e| WorkflowError::persistence(e.to_string()))?;

        info!(
            execution_id = %record.id(),
            workflow_id = %workflow.id(),
            steps = workflow.step_count(),
            "Execution created"
        );

        Ok(record)
    }

    async fn run(
        &self,
        workflow: &Workflow,
        record: ExecutionRecord,
        cancel: CancellationToken,
    ) -> Result<ExecutionRecord, WorkflowError> {
        if record.workflow_id() != workflow.id()
            || record.step_results().len() != workflow.step_count()
        {
            return Err(WorkflowError::validation(format!(
                "Execution '{}' does not belong to workflow '{}'",
                record.id(),
                workflow.id()
            )));
        }

        let span = info_span!(
            "execution",
            execution_id = %record.id(),
            workflow_id = %workflow.id()
        );

        self.run_steps(workflow, record, cancel).instrument(span).await
    }
}
