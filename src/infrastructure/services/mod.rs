//! Infrastructure services

mod prompt_service;
mod workflow_service;

pub use prompt_service::{CreatePromptRequest, PromptService, RenderedPrompt};
pub use workflow_service::{AddStepRequest, CreateWorkflowRequest, StepPrompt, WorkflowService};
