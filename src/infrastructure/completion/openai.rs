//! OpenAI-compatible chat completions as a [`CompletionProvider`]
//!
//! The rendered prompt is sent as a single user message. Any server exposing
//! `/v1/chat/completions` works (OpenAI, vLLM, Ollama, LiteLLM).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::http_client::HttpClientTrait;
use crate::domain::{Completion, CompletionProvider, DomainError, ModelPricing};

const PROVIDER_NAME: &str = "openai";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug)]
pub struct OpenAiCompletionProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    pricing: ModelPricing,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl<C: HttpClientTrait> OpenAiCompletionProvider<C> {
    /// `pricing.model_id` selects the model
    pub fn new(client: C, api_key: impl AsRef<str>, pricing: ModelPricing) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.as_ref()),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            pricing,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.pricing.model_id
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, prompt: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut body = json!({
            "model": self.model(),
            "messages": messages,
            "stream": false,
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Completion, DomainError> {
        let response: ChatResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(PROVIDER_NAME, "No choices in response"))?;

        let text = choice
            .message
            .content
            .ok_or_else(|| DomainError::provider(PROVIDER_NAME, "Response has no text content"))?;

        let (input_tokens, output_tokens) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(Completion::new(text)
            .with_usage(input_tokens, output_tokens)
            .with_cost_micros(self.pricing.calculate_cost(input_tokens, output_tokens)))
    }
}

#[async_trait]
impl<C: HttpClientTrait> CompletionProvider for OpenAiCompletionProvider<C> {
    async fn complete(&self, prompt: &str) -> Result<Completion, DomainError> {
        let headers = vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        let response = self
            .client
            .post_json(&self.chat_completions_url(), headers, &self.build_request(prompt))
            .await?;

        let completion = self.parse_response(response)?;
        debug!(
            model = %self.model(),
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "Completion received"
        );

        Ok(completion)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::completion::http_client::mock::MockHttpClient;
    use crate::infrastructure::completion::HttpClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_URL: &str = "https://api.openai.com/v1/chat/completions";

    fn chat_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500}
        })
    }

    fn pricing() -> ModelPricing {
        ModelPricing::new("gpt-4o-mini", 0.03, 0.06)
    }

    #[tokio::test]
    async fn test_complete_computes_usage_and_cost() {
        let client = MockHttpClient::new().with_response(TEST_URL, chat_response("Hello!"));
        let provider = OpenAiCompletionProvider::new(client, "key", pricing());

        let completion = provider.complete("Say hello").await.unwrap();

        assert_eq!(completion.output_text, "Hello!");
        assert_eq!(completion.input_tokens, 1000);
        assert_eq!(completion.output_tokens, 500);
        assert_eq!(completion.cost_micros, 60_000);
    }

    #[tokio::test]
    async fn test_request_body() {
        let client = MockHttpClient::new().with_response(TEST_URL, chat_response("ok"));
        let provider = OpenAiCompletionProvider::new(client, "key", pricing())
            .with_system_prompt("Be brief")
            .with_temperature(0.5)
            .with_max_tokens(64);

        provider.complete("Summarize this").await.unwrap();

        let body = &provider.client.requests()[0];
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Summarize this");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let client = MockHttpClient::new().with_response(TEST_URL, json!({"choices": []}));
        let provider = OpenAiCompletionProvider::new(client, "key", pricing());

        let result = provider.complete("x").await;
        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_missing_usage_counts_zero() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            json!({"choices": [{"message": {"content": "no usage"}}]}),
        );
        let provider = OpenAiCompletionProvider::new(client, "key", pricing());

        let completion = provider.complete("x").await.unwrap();
        assert_eq!(completion.total_tokens(), 0);
        assert_eq!(completion.cost_micros, 0);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let client = MockHttpClient::new().with_error(TEST_URL, "API key invalid");
        let provider = OpenAiCompletionProvider::new(client, "bad", pricing());

        assert!(provider.complete("x").await.is_err());
    }

    #[tokio::test]
    async fn test_against_http_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("served")))
            .mount(&server)
            .await;

        let provider = OpenAiCompletionProvider::new(HttpClient::new(), "key", pricing())
            .with_base_url(format!("{}/", server.uri()));

        let completion = provider.complete("x").await.unwrap();
        assert_eq!(completion.output_text, "served");
    }
}
