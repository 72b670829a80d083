//! Workflow error types

use thiserror::Error;

use crate::domain::DomainError;

/// Errors that can occur during workflow operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Workflow '{workflow}' has {actual} step(s), at least {required} required")]
    EmptyWorkflow {
        workflow: String,
        actual: usize,
        required: usize,
    },

    #[error("Step {step} maps '{variable}' to step {source_step}, which does not run before it")]
    ForwardReference {
        step: usize,
        variable: String,
        source_step: usize,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Step {step} failed: {message}")]
    StepExecution { step: usize, message: String },

    #[error("Timeout in step {step} after {timeout_ms}ms")]
    Timeout { step: usize, timeout_ms: u64 },

    #[error("Execution cancelled before step {0}")]
    Cancelled(usize),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn step_not_found(id: impl Into<String>) -> Self {
        Self::StepNotFound(id.into())
    }

    pub fn execution_not_found(id: impl Into<String>) -> Self {
        Self::ExecutionNotFound(id.into())
    }

    pub fn empty_workflow(workflow: impl Into<String>, actual: usize, required: usize) -> Self {
        Self::EmptyWorkflow {
            workflow: workflow.into(),
            actual,
            required,
        }
    }

    pub fn forward_reference(step: usize, variable: impl Into<String>, source_step: usize) -> Self {
        Self::ForwardReference {
            step,
            variable: variable.into(),
            source_step,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn step_execution(step: usize, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step,
            message: message.into(),
        }
    }

    pub fn timeout(step: usize, timeout_ms: u64) -> Self {
        Self::Timeout { step, timeout_ms }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Definition errors are reported before any execution record exists
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyWorkflow { .. } | Self::ForwardReference { .. } | Self::Validation(_)
        )
    }
}

impl From<DomainError> for WorkflowError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { message } | DomainError::InvalidId { message } => {
                Self::Validation(message)
            }
            DomainError::Conflict { message } => Self::Conflict(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}
