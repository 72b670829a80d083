//! Workflow execution infrastructure

mod orchestrator;
mod step_runner;

pub use orchestrator::{ExecutionOrchestrator, OrchestratorConfig};
pub use step_runner::StepRunner;
