use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Generated text plus usage accounting for one prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub output_text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost in micro-dollars
    pub cost_micros: i64,
}

impl Completion {
    pub fn new(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn with_cost_micros(mut self, cost_micros: i64) -> Self {
        self.cost_micros = cost_micros;
        self
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A service that turns a fully rendered prompt into text.
///
/// Calls are treated as atomic: callers never interrupt one midway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug {
    async fn complete(&self, prompt: &str) -> Result<Completion, DomainError>;
}
