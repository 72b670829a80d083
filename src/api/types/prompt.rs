//! Prompt library API types

use serde::{Deserialize, Serialize};

use crate::domain::prompt::VariableValues;
use crate::domain::Prompt;
use crate::infrastructure::services::{CreatePromptRequest, RenderedPrompt};

/// POST /v1/prompts
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromptApiRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
}

impl From<CreatePromptApiRequest> for CreatePromptRequest {
    fn from(req: CreatePromptApiRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            description: req.description,
            content: req.content,
        }
    }
}

/// POST /v1/prompts/{id}/render
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderPromptApiRequest {
    #[serde(default)]
    pub variables: VariableValues,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderPromptResponse {
    pub prompt_id: String,
    pub content: String,
    pub missing_variables: Vec<String>,
}

impl From<RenderedPrompt> for RenderPromptResponse {
    fn from(rendered: RenderedPrompt) -> Self {
        Self {
            prompt_id: rendered.prompt_id,
            content: rendered.content,
            missing_variables: rendered.missing_variables,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub variables: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Prompt> for PromptResponse {
    fn from(prompt: &Prompt) -> Self {
        Self {
            id: prompt.id().to_string(),
            name: prompt.name().to_string(),
            description: prompt.description().map(String::from),
            content: prompt.template().content().to_string(),
            variables: prompt.template().variables().to_vec(),
            created_at: prompt.created_at().to_rfc3339(),
            updated_at: prompt.updated_at().to_rfc3339(),
        }
    }
}
