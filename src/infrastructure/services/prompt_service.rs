//! Prompt service - reusable prompt templates that workflow steps copy from

use std::sync::Arc;

use crate::domain::prompt::VariableValues;
use crate::domain::storage::Storage;
use crate::domain::{DomainError, Prompt, PromptId};

/// Request to create a new prompt
#[derive(Debug, Clone)]
pub struct CreatePromptRequest {
    /// Generated when absent
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub content: String,
}

impl CreatePromptRequest {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            content: content.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Rendered prompt result
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub prompt_id: String,
    pub content: String,
    /// Declared variables that no value was given for
    pub missing_variables: Vec<String>,
}

#[derive(Debug)]
pub struct PromptService {
    storage: Arc<dyn Storage<Prompt>>,
}

impl PromptService {
    pub fn new(storage: Arc<dyn Storage<Prompt>>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Prompt>, DomainError> {
        let prompt_id = self.parse_id(id)?;
        self.storage.get(&prompt_id).await
    }

    /// Get a prompt by ID, returning an error if not found
    pub async fn get_required(&self, id: &str) -> Result<Prompt, DomainError> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Prompt '{}' not found", id)))
    }

    pub async fn list(&self) -> Result<Vec<Prompt>, DomainError> {
        let mut prompts = self.storage.list().await?;
        prompts.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(prompts)
    }

    pub async fn create(&self, request: CreatePromptRequest) -> Result<Prompt, DomainError> {
        if request.name.trim().is_empty() {
            return Err(DomainError::validation("Prompt name cannot be empty"));
        }

        let prompt_id = match &request.id {
            Some(id) => self.parse_id(id)?,
            None => PromptId::generate(),
        };

        if self.storage.exists(&prompt_id).await? {
            return Err(DomainError::conflict(format!(
                "Prompt '{}' already exists",
                prompt_id
            )));
        }

        let mut prompt = Prompt::new(prompt_id, request.name, request.content);
        if let Some(description) = request.description {
            prompt = prompt.with_description(description);
        }

        self.storage.create(prompt).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DomainError> {
        let prompt_id = self.parse_id(id)?;
        self.storage.delete(&prompt_id).await
    }

    /// Render a stored prompt. Unknown variables are kept as written.
    pub async fn render(
        &self,
        id: &str,
        values: &VariableValues,
    ) -> Result<RenderedPrompt, DomainError> {
        let prompt = self.get_required(id).await?;
        let template = prompt.template();

        Ok(RenderedPrompt {
            prompt_id: prompt.id().to_string(),
            content: template.render(values),
            missing_variables: template
                .missing_variables(values)
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    fn parse_id(&self, id: &str) -> Result<PromptId, DomainError> {
        PromptId::new(id).map_err(|e| DomainError::validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn create_service() -> PromptService {
        PromptService::new(Arc::new(InMemoryStorage::<Prompt>::new()))
    }

    #[tokio::test]
    async fn test_create_prompt() {
        let service = create_service();

        let prompt = service
            .create(
                CreatePromptRequest::new("Summary", "Summarize {{text}}")
                    .with_id("summary")
                    .with_description("Short summaries"),
            )
            .await
            .unwrap();

        assert_eq!(prompt.id().as_str(), "summary");
        assert_eq!(prompt.description(), Some("Short summaries"));
        assert_eq!(prompt.template().variables(), &["text"]);
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let service = create_service();

        let prompt = service
            .create(CreatePromptRequest::new("Anon", "Hello"))
            .await
            .unwrap();

        assert!(prompt.id().as_str().starts_with("prompt-"));
    }

    #[tokio::test]
    async fn test_create_duplicate_prompt() {
        let service = create_service();
        let request = CreatePromptRequest::new("Dup", "x").with_id("dup");

        service.create(request.clone()).await.unwrap();
        let result = service.create(request).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let service = create_service();

        let result = service.create(CreatePromptRequest::new("  ", "x")).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let service = create_service();

        let result = service.get("not valid").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_render_keeps_missing_variables() {
        let service = create_service();
        service
            .create(CreatePromptRequest::new("Greet", "Hi {{name}} from {{place}}").with_id("greet"))
            .await
            .unwrap();

        let mut values = VariableValues::new();
        values.insert("name".to_string(), "Ada".to_string());

        let rendered = service.render("greet", &values).await.unwrap();
        assert_eq!(rendered.content, "Hi Ada from {{place}}");
        assert_eq!(rendered.missing_variables, vec!["place"]);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let service = create_service();
        service
            .create(CreatePromptRequest::new("A", "a").with_id("a"))
            .await
            .unwrap();
        service
            .create(CreatePromptRequest::new("B", "b").with_id("b"))
            .await
            .unwrap();

        assert!(service.delete("a").await.unwrap());
        assert!(!service.delete("a").await.unwrap());

        let remaining = service.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id().as_str(), "b");
    }

    #[tokio::test]
    async fn test_get_required_not_found() {
        let service = create_service();

        let result = service.get_required("missing").await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
