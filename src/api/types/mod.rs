//! API request and response types

pub mod error;
pub mod json;
pub mod prompt;
pub mod workflow;

pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
pub use prompt::{CreatePromptApiRequest, PromptResponse, RenderPromptApiRequest, RenderPromptResponse};
pub use workflow::{
    AddStepApiRequest, AsyncQueryParams, CreateWorkflowApiRequest, ExecuteWorkflowApiRequest,
    ListExecutionsResponse, ListWorkflowsResponse, ReorderStepsApiRequest, StepResponse,
    UpdateStepApiRequest, WorkflowResponse,
};
