//! Execution records and step results

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{StepId, Workflow, WorkflowId};
use super::error::WorkflowError;
use super::resolver::{Resolution, ResolutionGap, StepOutputs};
use crate::domain::completion::Completion;
use crate::domain::id::define_id;
use crate::domain::prompt::VariableValues;
use crate::domain::storage::StorageEntity;

define_id!(
    /// Validated execution identifier
    ExecutionId,
    "Execution",
    "exec"
);

/// Status of a whole execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, target: ExecutionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

fn elapsed_ms(start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Option<u64> {
    start.map(|s| (end - s).num_milliseconds().max(0) as u64)
}

/// Outcome of one step. Resolved variables and the rendered prompt are
/// snapshots, so later edits to the step definition never change them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    step_id: StepId,
    order: usize,
    status: StepStatus,

    #[serde(default)]
    resolved_variables: VariableValues,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resolution_gaps: Vec<ResolutionGap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    rendered_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,

    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
    cost_micros: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StepResult {
    pub fn pending(step_id: StepId, order: usize) -> Self {
        Self {
            step_id,
            order,
            status: StepStatus::Pending,
            resolved_variables: VariableValues::new(),
            resolution_gaps: Vec::new(),
            rendered_prompt: None,
            output: None,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            cost_micros: 0,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    // Getters

    pub fn step_id(&self) -> &StepId {
        &self.step_id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn resolved_variables(&self) -> &VariableValues {
        &self.resolved_variables
    }

    pub fn resolution_gaps(&self) -> &[ResolutionGap] {
        &self.resolution_gaps
    }

    pub fn rendered_prompt(&self) -> Option<&str> {
        self.rendered_prompt.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn input_tokens(&self) -> u32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u32 {
        self.output_tokens
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }

    pub fn cost_micros(&self) -> i64 {
        self.cost_micros
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // Transitions

    fn transition(&mut self, target: StepStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(target) {
            return Err(WorkflowError::invalid_transition(self.status, target));
        }
        self.status = target;
        Ok(())
    }

    /// Snapshot the resolution and rendered prompt, then start the step
    pub fn mark_running(
        &mut self,
        resolution: Resolution,
        rendered_prompt: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Running)?;
        self.resolved_variables = resolution.values;
        self.resolution_gaps = resolution.gaps;
        self.rendered_prompt = Some(rendered_prompt.into());
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self, completion: Completion) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Completed)?;
        self.input_tokens = completion.input_tokens;
        self.output_tokens = completion.output_tokens;
        self.total_tokens = completion.total_tokens();
        self.cost_micros = completion.cost_micros;
        self.output = Some(completion.output_text);
        self.finish();
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Failed)?;
        self.error = Some(error.into());
        self.finish();
        Ok(())
    }

    pub fn mark_skipped(&mut self) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Skipped)
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
    }
}

/// One run of a workflow against one initial input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    id: ExecutionId,
    workflow_id: WorkflowId,

    /// Workflow version the run was started from
    workflow_version: u32,

    initial_input: Map<String, Value>,
    status: ExecutionStatus,
    created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,

    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    total_cost_micros: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    final_output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<usize>,

    step_results: Vec<StepResult>,
}

impl ExecutionRecord {
    /// Create a pending record with one pending result per step
    pub fn new(workflow: &Workflow, initial_input: Map<String, Value>) -> Self {
        let step_results = workflow
            .steps()
            .iter()
            .map(|step| StepResult::pending(step.id().clone(), step.order()))
            .collect();

        Self {
            id: ExecutionId::generate(),
            workflow_id: workflow.id().clone(),
            workflow_version: workflow.version(),
            initial_input,
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            total_cost_micros: 0,
            final_output: None,
            error: None,
            failed_step: None,
            step_results,
        }
    }

    // Getters

    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn workflow_version(&self) -> u32 {
        self.workflow_version
    }

    pub fn initial_input(&self) -> &Map<String, Value> {
        &self.initial_input
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn total_cost_micros(&self) -> i64 {
        self.total_cost_micros
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn failed_step(&self) -> Option<usize> {
        self.failed_step
    }

    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    pub fn step_result(&self, order: usize) -> Option<&StepResult> {
        self.step_results.get(order)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Outputs of completed steps, keyed by order
    pub fn step_outputs(&self) -> StepOutputs {
        self.step_results
            .iter()
            .filter(|r| r.status == StepStatus::Completed)
            .filter_map(|r| r.output.clone().map(|output| (r.order, output)))
            .collect()
    }

    // Transitions

    fn transition(&mut self, target: ExecutionStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(target) {
            return Err(WorkflowError::invalid_transition(self.status, target));
        }
        self.status = target;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Store a step result that has just started running in its pending slot
    pub fn start_step(&mut self, result: StepResult) -> Result<(), WorkflowError> {
        let order = result.order;
        let slot = self
            .step_results
            .get(order)
            .filter(|slot| slot.step_id == result.step_id)
            .ok_or_else(|| WorkflowError::step_not_found(result.step_id.as_str()))?;

        if slot.status != StepStatus::Pending || result.status != StepStatus::Running {
            return Err(WorkflowError::invalid_transition(slot.status, result.status));
        }

        self.step_results[order] = result;
        Ok(())
    }

    /// Store a terminal step result in its slot, adding its usage to the
    /// totals when it completed
    pub fn record_step(&mut self, result: StepResult) -> Result<(), WorkflowError> {
        let order = result.order;
        let slot = self
            .step_results
            .get(order)
            .filter(|slot| slot.step_id == result.step_id)
            .ok_or_else(|| WorkflowError::step_not_found(result.step_id.as_str()))?;

        if slot.status.is_terminal() || !result.status.is_terminal() {
            return Err(WorkflowError::invalid_transition(slot.status, result.status));
        }

        if result.status == StepStatus::Completed {
            self.input_tokens += u64::from(result.input_tokens);
            self.output_tokens += u64::from(result.output_tokens);
            self.total_tokens += u64::from(result.total_tokens);
            self.total_cost_micros += result.cost_micros;
        }

        self.step_results[order] = result;
        Ok(())
    }

    /// Mark every step from `order` onwards that has not started as skipped
    pub fn skip_remaining(&mut self, order: usize) -> Result<(), WorkflowError> {
        for result in self.step_results.iter_mut().skip(order) {
            if result.status == StepStatus::Pending {
                result.mark_skipped()?;
            }
        }
        Ok(())
    }

    /// Finish successfully; the final output is the last step's output
    pub fn mark_completed(&mut self) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Completed)?;
        self.final_output = self.step_results.last().and_then(|r| r.output.clone());
        self.finish();
        Ok(())
    }

    /// Finish with an error attributed to the step at `order`
    pub fn mark_failed(&mut self, order: usize, error: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(ExecutionStatus::Failed)?;
        self.error = Some(error.into());
        self.failed_step = Some(order);
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
    }
}

impl StorageEntity for ExecutionRecord {
    type Key = ExecutionId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}
