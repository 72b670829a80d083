//! Domain layer - Core business logic and entities

pub mod completion;
pub mod error;
pub mod id;
pub mod prompt;
pub mod storage;
pub mod workflow;

pub use completion::{Completion, CompletionProvider, ModelPricing};
pub use error::DomainError;
pub use prompt::{Prompt, PromptId, PromptTemplate};
pub use storage::{Storage, StorageEntity, StorageKey};
pub use workflow::{
    ExecutionId, ExecutionRecord, ExecutionStatus, StepDefinition, StepId, StepResult, StepStatus,
    Workflow, WorkflowError, WorkflowExecutor, WorkflowId,
};
