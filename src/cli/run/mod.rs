//! Run command - executes a workflow definition file once
//!
//! Definition format:
//!
//! ```json
//! {
//!   "name": "Blog post",
//!   "steps": [
//!     { "prompt": "Outline {{topic}}", "input_mapping": { "topic": "initial.topic" } },
//!     { "prompt": "Write from {{outline}}", "input_mapping": { "outline": "step.0.output" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::api::state::WorkflowServiceTrait;
use crate::config::AppConfig;
use crate::domain::{ExecutionRecord, ExecutionStatus, WorkflowError};
use crate::infrastructure::logging;
use crate::infrastructure::services::{AddStepRequest, CreateWorkflowRequest};
use crate::infrastructure::storage::StorageFactory;
use crate::infrastructure::workflow::OrchestratorConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow definition file (JSON)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Initial input as a JSON object
    #[arg(short, long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowFile {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepFile>,
}

#[derive(Debug, Deserialize)]
pub struct StepFile {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let definition: WorkflowFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid workflow definition in {}", args.file.display()))?;
    let input: Value = match &args.input {
        Some(input) => serde_json::from_str(input).context("--input is not valid JSON")?,
        None => Value::Null,
    };

    let provider =
        crate::create_completion_provider(&config.provider, config.engine.step_timeout_ms)?;
    let state = crate::create_app_state(
        &StorageFactory::in_memory(),
        provider,
        OrchestratorConfig::from(&config.engine),
    )
    .await?;

    let record = execute_definition(state.workflow_service.as_ref(), definition, input).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if record.status() == ExecutionStatus::Failed {
        anyhow::bail!(
            "Execution failed: {}",
            record.error().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Register the definition with `service` and execute it synchronously
pub async fn execute_definition(
    service: &dyn WorkflowServiceTrait,
    definition: WorkflowFile,
    input: Value,
) -> Result<ExecutionRecord, WorkflowError> {
    let mut request = CreateWorkflowRequest::new(definition.name);
    request.id = definition.id;
    request.description = definition.description;

    let workflow = service.create_workflow(request).await?;
    let workflow_id = workflow.id().as_str();

    for step in definition.steps {
        let mut request = AddStepRequest::inline(step.prompt);
        request.step_id = step.id;
        request.input_mapping = step.input_mapping;

        service.add_step(workflow_id, request).await?;
    }

    info!(workflow_id = %workflow_id, "Workflow loaded from file");
    service.execute(workflow_id, input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use crate::domain::completion::MockCompletionProvider;
    use crate::domain::Completion;

    async fn service() -> Arc<dyn WorkflowServiceTrait> {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .returning(|prompt| Ok(Completion::new(format!("[{}]", prompt))));

        let state = crate::create_app_state(
            &StorageFactory::in_memory(),
            Arc::new(provider),
            OrchestratorConfig::default(),
        )
        .await
        .unwrap();

        state.workflow_service
    }

    fn definition(raw: Value) -> WorkflowFile {
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn test_execute_definition() {
        let service = service().await;
        let definition = definition(json!({
            "name": "Blog",
            "steps": [
                {"prompt": "Outline {{topic}}", "input_mapping": {"topic": "initial.topic"}},
                {"prompt": "Write {{outline}}", "input_mapping": {"outline": "step.0.output"}}
            ]
        }));

        let record = assert_ok!(
            execute_definition(service.as_ref(), definition, json!({"topic": "owls"})).await
        );

        assert_eq!(record.status(), ExecutionStatus::Completed);
        assert_eq!(record.final_output(), Some("[Write [Outline owls]]"));
    }

    #[tokio::test]
    async fn test_definition_with_forward_reference() {
        let service = service().await;
        let definition = definition(json!({
            "id": "bad-flow",
            "name": "Bad",
            "steps": [
                {"prompt": "{{x}}", "input_mapping": {"x": "step.0.output"}}
            ]
        }));

        let err = assert_err!(execute_definition(service.as_ref(), definition, Value::Null).await);
        assert!(matches!(err, WorkflowError::ForwardReference { step: 0, .. }));
    }

    #[test]
    fn test_definition_requires_steps() {
        let parsed: Result<WorkflowFile, _> = serde_json::from_value(json!({"name": "x"}));
        assert!(parsed.is_err());
    }
}
