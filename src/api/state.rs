//! Application state for shared services

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::prompt::VariableValues;
use crate::domain::{DomainError, ExecutionRecord, Prompt, StepDefinition, Workflow, WorkflowError};
use crate::infrastructure::services::{
    AddStepRequest, CreatePromptRequest, CreateWorkflowRequest, PromptService, RenderedPrompt,
    WorkflowService,
};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<dyn WorkflowServiceTrait>,
    pub prompt_service: Arc<dyn PromptServiceTrait>,
}

impl AppState {
    pub fn new(
        workflow_service: Arc<dyn WorkflowServiceTrait>,
        prompt_service: Arc<dyn PromptServiceTrait>,
    ) -> Self {
        Self {
            workflow_service,
            prompt_service,
        }
    }
}

/// Trait for prompt library operations
#[async_trait::async_trait]
pub trait PromptServiceTrait: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Prompt>, DomainError>;
    async fn list(&self) -> Result<Vec<Prompt>, DomainError>;
    async fn create(&self, request: CreatePromptRequest) -> Result<Prompt, DomainError>;
    async fn delete(&self, id: &str) -> Result<bool, DomainError>;
    async fn render(&self, id: &str, values: &VariableValues)
    -> Result<RenderedPrompt, DomainError>;
}

/// Trait for workflow definition and execution operations
#[async_trait::async_trait]
pub trait WorkflowServiceTrait: Send + Sync {
    async fn create_workflow(&self, request: CreateWorkflowRequest)
    -> Result<Workflow, WorkflowError>;
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, WorkflowError>;
    async fn list_workflows(&self) -> Result<Vec<Workflow>, WorkflowError>;
    async fn delete_workflow(&self, id: &str) -> Result<bool, WorkflowError>;
    async fn add_step(
        &self,
        workflow_id: &str,
        request: AddStepRequest,
    ) -> Result<StepDefinition, WorkflowError>;
    async fn reorder_steps(
        &self,
        workflow_id: &str,
        ordered_step_ids: &[String],
    ) -> Result<Workflow, WorkflowError>;
    async fn update_step(
        &self,
        step_id: &str,
        input_mapping: Option<BTreeMap<String, String>>,
    ) -> Result<StepDefinition, WorkflowError>;
    async fn remove_step(&self, step_id: &str) -> Result<StepDefinition, WorkflowError>;
    async fn execute(&self, workflow_id: &str, input: Value)
    -> Result<ExecutionRecord, WorkflowError>;
    async fn start_execution(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionRecord, WorkflowError>;
    async fn cancel_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError>;
    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError>;
    async fn list_executions(&self, workflow_id: &str)
    -> Result<Vec<ExecutionRecord>, WorkflowError>;
}

// Implement traits for the actual services

#[async_trait::async_trait]
impl PromptServiceTrait for PromptService {
    async fn get(&self, id: &str) -> Result<Option<Prompt>, DomainError> {
        PromptService::get(self, id).await
    }

    async fn list(&self) -> Result<Vec<Prompt>, DomainError> {
        PromptService::list(self).await
    }

    async fn create(&self, request: CreatePromptRequest) -> Result<Prompt, DomainError> {
        PromptService::create(self, request).await
    }

    async fn delete(&self, id: &str) -> Result<bool, DomainError> {
        PromptService::delete(self, id).await
    }

    async fn render(
        &self,
        id: &str,
        values: &VariableValues,
    ) -> Result<RenderedPrompt, DomainError> {
        PromptService::render(self, id, values).await
    }
}

#[async_trait::async_trait]
impl WorkflowServiceTrait for WorkflowService {
    async fn create_workflow(
        &self,
        request: CreateWorkflowRequest,
    ) -> Result<Workflow, WorkflowError> {
        WorkflowService::create_workflow(self, request).await
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, WorkflowError> {
        WorkflowService::get_workflow(self, id).await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, WorkflowError> {
        WorkflowService::list_workflows(self).await
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, WorkflowError> {
        WorkflowService::delete_workflow(self, id).await
    }

    async fn add_step(
        &self,
        workflow_id: &str,
        request: AddStepRequest,
    ) -> Result<StepDefinition, WorkflowError> {
        WorkflowService::add_step(self, workflow_id, request).await
    }

    async fn reorder_steps(
        &self,
        workflow_id: &str,
        ordered_step_ids: &[String],
    ) -> Result<Workflow, WorkflowError> {
        WorkflowService::reorder_steps(self, workflow_id, ordered_step_ids).await
    }

    async fn update_step(
        &self,
        step_id: &str,
        input_mapping: Option<BTreeMap<String, String>>,
    ) -> Result<StepDefinition, WorkflowError> {
        WorkflowService::update_step(self, step_id, input_mapping).await
    }

    async fn remove_step(&self, step_id: &str) -> Result<StepDefinition, WorkflowError> {
        WorkflowService::remove_step(self, step_id).await
    }

    async fn execute(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionRecord, WorkflowError> {
        WorkflowService::execute(self, workflow_id, input).await
    }

    async fn start_execution(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionRecord, WorkflowError> {
        WorkflowService::start_execution(self, workflow_id, input).await
    }

    async fn cancel_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError> {
        WorkflowService::cancel_execution(self, id).await
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, WorkflowError> {
        WorkflowService::get_execution(self, id).await
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ExecutionRecord>, WorkflowError> {
        WorkflowService::list_executions(self, workflow_id).await
    }
}
