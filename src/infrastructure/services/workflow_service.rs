//! Workflow service - definition management and execution entry points

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::storage::Storage;
use crate::domain::workflow::parse_mapping;
use crate::domain::{
    ExecutionId, ExecutionRecord, Prompt, PromptId, PromptTemplate, StepDefinition, StepId,
    Workflow, WorkflowError, WorkflowExecutor, WorkflowId,
};

/// Request to create a new workflow
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    /// Generated when absent
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

impl CreateWorkflowRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Where a new step takes its template from
#[derive(Debug, Clone)]
pub enum StepPrompt {
    /// Template text given directly
    Inline(String),
    /// Library prompt, copied into the step when it is added
    Library(String),
}

/// Request to add a step to a workflow
#[derive(Debug, Clone)]
pub struct AddStepRequest {
    /// Generated when absent
    pub step_id: Option<String>,
    pub prompt: StepPrompt,
    /// Insert position; appends when absent
    pub order: Option<usize>,
    /// Variable name to source reference (`initial.<field>`, `step.<k>.output`)
    pub input_mapping: BTreeMap<String, String>,
}

impl AddStepRequest {
    pub fn inline(template: impl Into<String>) -> Self {
        Self::with_prompt(StepPrompt::Inline(template.into()))
    }

    pub fn library(prompt_id: impl Into<String>) -> Self {
        Self::with_prompt(StepPrompt::Library(prompt_id.into()))
    }

    fn with_prompt(prompt: StepPrompt) -> Self {
        Self {
            step_id: None,
            prompt,
            order: None,
            input_mapping: BTreeMap::new(),
        }
    }

    pub fn with_step_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn at(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn map(mut self, variable: impl Into<String>, source: impl Into<String>) -> Self {
        self.input_mapping.insert(variable.into(), source.into());
        self
    }
}

/// Cancellation handles for executions running in this process
type RunningExecutions = Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>;

pub struct WorkflowService {
    workflows: Arc<dyn Storage<Workflow>>,
    prompts: Arc<dyn Storage<Prompt>>,
    executions: Arc<dyn Storage<ExecutionRecord>>,
    executor: Arc<dyn WorkflowExecutor>,
    running: RunningExecutions,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService").finish()
    }
}

impl WorkflowService {
    pub fn new(
        workflows: Arc<dyn Storage<Workflow>>,
        prompts: Arc<dyn Storage<Prompt>>,
        executions: Arc<dyn Storage<ExecutionRecord>>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            workflows,
            prompts,
            executions,
            executor,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // Definitions

    pub async fn create_workflow(
        &self,
        request: CreateWorkflowRequest,
    ) -> Result<Workflow, WorkflowError> {
        if request.name.trim().is_empty() {
            return Err(WorkflowError::validation("Workflow name cannot be empty"));
        }

        let workflow_id = match &request.id {
            Some(id) => WorkflowId::new(id)?,
            None => WorkflowId::generate(),
        };

        if self.workflows.exists(&workflow_id).await? {
            return Err(WorkflowError::validation(format!(
                "Workflow '{}' already exists",
                workflow_id
            )));
        }

        let mut workflow = Workflow::new(workflow_id, request.name);
        if let Some(description) = request.description {
            workflow = workflow.with_description(description);
        }

        let workflow = self.workflows.create(workflow).await?;
        info!(workflow_id = %workflow.id(), "Workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, WorkflowError> {
        let workflow_id = WorkflowId::new(id)?;
        Ok(self.workflows.get(&workflow_id).await?)
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, WorkflowError> {
        let mut workflows = self.workflows.list().await?;
        workflows.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(workflows)
    }

    pub async fn delete_workflow(&self, id: &str) -> Result<bool, WorkflowError> {
        let workflow_id = WorkflowId::new(id)?;
        Ok(self.workflows.delete(&workflow_id).await?)
    }

    pub async fn add_step(
        &self,
        workflow_id: &str,
        request: AddStepRequest,
    ) -> Result<StepDefinition, WorkflowError> {
        let mut workflow = self.load_workflow(workflow_id).await?;
        let loaded_version = workflow.version();

        let step_id = match &request.step_id {
            Some(id) => {
                let id = StepId::new(id)?;
                if self.find_owner(&id).await?.is_some() {
                    return Err(WorkflowError::validation(format!(
                        "Step '{}' already exists",
                        id
                    )));
                }
                id
            }
            None => StepId::generate(),
        };

        let step = match request.prompt {
            StepPrompt::Inline(template) => {
                StepDefinition::new(step_id, PromptTemplate::parse(template))
            }
            StepPrompt::Library(prompt_id) => {
                let prompt_id = PromptId::new(prompt_id)?;
                let prompt = self.prompts.get(&prompt_id).await?.ok_or_else(|| {
                    WorkflowError::validation(format!("Prompt '{}' not found", prompt_id))
                })?;

                StepDefinition::new(step_id, prompt.template().clone()).with_prompt_id(prompt_id)
            }
        }
        .with_input_mapping(parse_mapping(request.input_mapping));

        let added = workflow.insert_step(step, request.order).clone();
        self.save_workflow(workflow, loaded_version).await?;

        info!(
            workflow_id = %workflow_id,
            step_id = %added.id(),
            order = added.order(),
            "Step added"
        );
        Ok(added)
    }

    pub async fn reorder_steps(
        &self,
        workflow_id: &str,
        ordered_step_ids: &[String],
    ) -> Result<Workflow, WorkflowError> {
        let ids = ordered_step_ids
            .iter()
            .map(StepId::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut workflow = self.load_workflow(workflow_id).await?;
        let loaded_version = workflow.version();
        workflow.reorder_steps(&ids)?;

        self.save_workflow(workflow, loaded_version).await
    }

    /// Replace a step's input mapping when one is given
    pub async fn update_step(
        &self,
        step_id: &str,
        input_mapping: Option<BTreeMap<String, String>>,
    ) -> Result<StepDefinition, WorkflowError> {
        let step_id = StepId::new(step_id)?;
        let mut workflow = self
            .find_owner(&step_id)
            .await?
            .ok_or_else(|| WorkflowError::step_not_found(step_id.as_str()))?;

        let Some(mapping) = input_mapping else {
            return workflow
                .get_step(&step_id)
                .cloned()
                .ok_or_else(|| WorkflowError::step_not_found(step_id.as_str()));
        };

        let loaded_version = workflow.version();
        let updated = workflow.set_step_mapping(&step_id, parse_mapping(mapping))?.clone();
        self.save_workflow(workflow, loaded_version).await?;
        Ok(updated)
    }

    pub async fn remove_step(&self, step_id: &str) -> Result<StepDefinition, WorkflowError> {
        let step_id = StepId::new(step_id)?;
        let mut workflow = self
            .find_owner(&step_id)
            .await?
            .ok_or_else(|| WorkflowError::step_not_found(step_id.as_str()))?;

        let loaded_version = workflow.version();
        let removed = workflow.remove_step(&step_id)?;
        self.save_workflow(workflow, loaded_version).await?;
        Ok(removed)
    }

    // Executions

    /// Run a workflow to completion and return the final record.
    ///
    /// The run lives in its own task: dropping the returned future stops
    /// waiting for it, not the run itself.
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionRecord, WorkflowError> {
        let workflow = self.load_workflow(workflow_id).await?;
        let record = self.executor.prepare(&workflow, input_object(input)?).await?;

        self.spawn_run(workflow, record)
            .await
            .map_err(|e| WorkflowError::internal(format!("Execution task failed: {}", e)))?
    }

    /// Persist a pending record and run it in the background
    pub async fn start_execution(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionRecord, WorkflowError> {
        let workflow = self.load_workflow(workflow_id).await?;
        let record = self.executor.prepare(&workflow, input_object(input)?).await?;

        let pending = record.clone();
        drop(self.spawn_run(workflow, record));

        Ok(pending)
    }

    /// Request cancellation; the run stops before its next step
    pub async fn cancel_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError> {
        let record = self.get_execution(id).await?;

        if record.is_terminal() {
            return Err(WorkflowError::validation(format!(
                "Execution '{}' already finished with status {}",
                id,
                record.status()
            )));
        }

        let token = self.tokens().get(record.id()).cloned();
        let Some(token) = token else {
            return Err(WorkflowError::validation(format!(
                "Execution '{}' is not running in this process",
                id
            )));
        };
        token.cancel();

        info!(execution_id = %id, "Cancellation requested");
        Ok(record)
    }

    pub async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError> {
        let execution_id = ExecutionId::new(id)?;
        self.executions
            .get(&execution_id)
            .await?
            .ok_or_else(|| WorkflowError::execution_not_found(id))
    }

    /// Executions of one workflow, newest first
    pub async fn list_executions(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ExecutionRecord>, WorkflowError> {
        let workflow_id = WorkflowId::new(workflow_id)?;

        let mut records: Vec<_> = self
            .executions
            .list()
            .await?
            .into_iter()
            .filter(|r| r.workflow_id() == &workflow_id)
            .collect();
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(records)
    }

    // Helpers

    async fn load_workflow(&self, id: &str) -> Result<Workflow, WorkflowError> {
        let workflow_id = WorkflowId::new(id)?;
        self.workflows
            .get(&workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(id))
    }

    async fn find_owner(&self, step_id: &StepId) -> Result<Option<Workflow>, WorkflowError> {
        Ok(self
            .workflows
            .list()
            .await?
            .into_iter()
            .find(|w| w.contains_step(step_id)))
    }

    /// Revision-checked write of an edited definition loaded at `loaded_version`
    async fn save_workflow(
        &self,
        workflow: Workflow,
        loaded_version: u32,
    ) -> Result<Workflow, WorkflowError> {
        let workflow_id = workflow.id().clone();

        self.workflows
            .update_if_revision(workflow, u64::from(loaded_version))
            .await
            .map_err(|e| match WorkflowError::from(e) {
                WorkflowError::Conflict(_) => WorkflowError::conflict(format!(
                    "Workflow '{}' was modified concurrently, reload and retry",
                    workflow_id
                )),
                other => other,
            })
    }

    /// Run `record` on its own task; the cancellation token is released when it ends
    fn spawn_run(
        &self,
        workflow: Workflow,
        record: ExecutionRecord,
    ) -> JoinHandle<Result<ExecutionRecord, WorkflowError>> {
        let execution_id = record.id().clone();
        let token = self.register(&execution_id);
        let executor = Arc::clone(&self.executor);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let result = executor.run(&workflow, record, token).await;
            if let Err(e) = &result {
                error!(execution_id = %execution_id, error = %e, "Execution failed");
            }
            running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&execution_id);
            result
        })
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<ExecutionId, CancellationToken>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, execution_id: &ExecutionId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens().insert(execution_id.clone(), token.clone());
        token
    }
}

/// Initial input must be a JSON object; `null` means no input
fn input_object(input: Value) -> Result<Map<String, Value>, WorkflowError> {
    match input {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(WorkflowError::invalid_input(format!(
            "Initial input must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
