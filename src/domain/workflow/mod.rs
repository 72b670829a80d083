//! Workflow domain module
//!
//! A workflow is a linear chain of prompt steps. Each step maps its template
//! variables to a source:
//! - `initial.<field>` - a field of the execution's initial input
//! - `step.<k>.output` - the output of an earlier step `k`
//!
//! Executions run the steps in order, stop at the first failure and keep an
//! auditable [`ExecutionRecord`].

mod entity;
mod error;
mod execution;
mod executor;
pub mod resolver;
mod source;

pub use entity::{StepDefinition, StepId, Workflow, WorkflowId};
pub use error::WorkflowError;
pub use execution::{ExecutionId, ExecutionRecord, ExecutionStatus, StepResult, StepStatus};
pub use executor::WorkflowExecutor;
pub use resolver::{resolve, GapReason, Resolution, ResolutionGap, StepOutputs};
pub use source::{parse_mapping, InputMapping, SourceRef};
