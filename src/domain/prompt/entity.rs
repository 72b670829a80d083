//! Prompt entity - reusable prompt templates that steps can copy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::PromptTemplate;
use crate::domain::id::define_id;
use crate::domain::storage::StorageEntity;

define_id!(
    /// Prompt identifier
    PromptId,
    "Prompt",
    "prompt"
);

/// A named prompt template kept in the prompt library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    id: PromptId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    template: PromptTemplate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new(id: PromptId, name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            template: PromptTemplate::parse(content),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &PromptId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replace the template text. Steps that already copied it keep their copy.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.template = PromptTemplate::parse(content);
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for Prompt {
    type Key = PromptId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_declares_variables() {
        let prompt = Prompt::new(PromptId::generate(), "Summarize", "Summarize {{text}}")
            .with_description("One paragraph summary");

        assert_eq!(prompt.name(), "Summarize");
        assert_eq!(prompt.description(), Some("One paragraph summary"));
        assert_eq!(prompt.template().variables(), &["text"]);
    }

    #[test]
    fn test_set_content_reparses_template() {
        let mut prompt = Prompt::new(PromptId::generate(), "Greet", "Hello {{name}}");
        let before = prompt.updated_at();

        std::thread::sleep(std::time::Duration::from_millis(5));
        prompt.set_content("Hi {{first}} {{last}}");

        assert_eq!(prompt.template().variables(), &["first", "last"]);
        assert!(prompt.updated_at() > before);
    }

    #[test]
    fn test_prompt_serialization() {
        let prompt = Prompt::new(PromptId::new("greeting").unwrap(), "Greet", "Hello {{name}}");
        let json = serde_json::to_string(&prompt).unwrap();

        assert!(json.contains("\"id\":\"greeting\""));
        assert!(!json.contains("description"));

        let restored: Prompt = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.template().content(), "Hello {{name}}");
    }
}
