//! Workflow and execution API types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use crate::domain::{ExecutionRecord, StepDefinition, Workflow};
use crate::infrastructure::services::{AddStepRequest, CreateWorkflowRequest, StepPrompt};

/// Query parameters for async execution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsyncQueryParams {
    /// Return 202 Accepted with the pending record instead of waiting
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

/// POST /v1/workflows
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkflowApiRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CreateWorkflowApiRequest> for CreateWorkflowRequest {
    fn from(req: CreateWorkflowApiRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            description: req.description,
        }
    }
}

/// POST /v1/workflows/{id}/steps
///
/// Exactly one of `prompt` (inline template) or `prompt_id` (library prompt)
/// must be given.
#[derive(Debug, Clone, Deserialize)]
pub struct AddStepApiRequest {
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub order: Option<usize>,
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,
}

impl TryFrom<AddStepApiRequest> for AddStepRequest {
    type Error = ApiError;

    fn try_from(req: AddStepApiRequest) -> Result<Self, Self::Error> {
        let prompt = match (req.prompt, req.prompt_id) {
            (Some(template), None) => StepPrompt::Inline(template),
            (None, Some(prompt_id)) => StepPrompt::Library(prompt_id),
            (Some(_), Some(_)) => {
                return Err(ApiError::bad_request("Give either 'prompt' or 'prompt_id', not both")
                    .with_param("prompt"));
            }
            (None, None) => {
                return Err(ApiError::bad_request("One of 'prompt' or 'prompt_id' is required")
                    .with_param("prompt"));
            }
        };

        Ok(Self {
            step_id: req.step_id,
            prompt,
            order: req.order,
            input_mapping: req.input_mapping,
        })
    }
}

/// PUT /v1/workflows/{id}/steps/order
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderStepsApiRequest {
    pub step_ids: Vec<String>,
}

/// PATCH /v1/steps/{step_id}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStepApiRequest {
    #[serde(default)]
    pub input_mapping: Option<BTreeMap<String, String>>,
}

/// POST /v1/workflows/{id}/execute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteWorkflowApiRequest {
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResponse {
    pub id: String,
    pub order: usize,
    pub prompt: String,
    pub variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    pub input_mapping: BTreeMap<String, String>,
}

impl From<&StepDefinition> for StepResponse {
    fn from(step: &StepDefinition) -> Self {
        Self {
            id: step.id().to_string(),
            order: step.order(),
            prompt: step.prompt().content().to_string(),
            variables: step.prompt().variables().to_vec(),
            prompt_id: step.prompt_id().map(|id| id.to_string()),
            input_mapping: step
                .input_mapping()
                .iter()
                .map(|(name, source)| (name.clone(), source.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepResponse>,
    pub version: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Workflow> for WorkflowResponse {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id().to_string(),
            name: workflow.name().to_string(),
            description: workflow.description().map(String::from),
            steps: workflow.steps().iter().map(StepResponse::from).collect(),
            version: workflow.version(),
            created_at: workflow.created_at().to_rfc3339(),
            updated_at: workflow.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListWorkflowsResponse {
    pub workflows: Vec<WorkflowResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListExecutionsResponse {
    pub executions: Vec<ExecutionRecord>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::parse_mapping;
    use crate::domain::{PromptTemplate, StepId};

    #[test]
    fn test_add_step_request_inline() {
        let req: AddStepApiRequest = serde_json::from_str(
            r#"{"prompt": "Hi {{name}}", "input_mapping": {"name": "initial.name"}}"#,
        )
        .unwrap();

        let request = AddStepRequest::try_from(req).unwrap();
        assert!(matches!(request.prompt, StepPrompt::Inline(ref t) if t == "Hi {{name}}"));
        assert_eq!(request.input_mapping["name"], "initial.name");
        assert!(request.order.is_none());
    }

    #[test]
    fn test_add_step_request_requires_one_prompt_source() {
        let both: AddStepApiRequest =
            serde_json::from_str(r#"{"prompt": "x", "prompt_id": "p"}"#).unwrap();
        assert!(AddStepRequest::try_from(both).is_err());

        let neither: AddStepApiRequest = serde_json::from_str(r#"{"order": 1}"#).unwrap();
        let err = AddStepRequest::try_from(neither).unwrap_err();
        assert_eq!(err.response.error.param.as_deref(), Some("prompt"));
    }

    #[test]
    fn test_execute_request_defaults_to_null_input() {
        let req: ExecuteWorkflowApiRequest = serde_json::from_str("{}").unwrap();
        assert!(req.input.is_null());
    }

    #[test]
    fn test_step_response_keeps_raw_sources() {
        let step = StepDefinition::new(StepId::new("s1").unwrap(), PromptTemplate::parse("{{a}}"))
            .with_input_mapping(parse_mapping([("a", "step.01.output")]));

        let response = StepResponse::from(&step);
        assert_eq!(response.input_mapping["a"], "step.01.output");
        assert_eq!(response.variables, vec!["a"]);
    }
}
