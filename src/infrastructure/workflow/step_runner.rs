//! Runs a single step: resolve, render, call the provider

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::workflow::{resolve, StepOutputs};
use crate::domain::{CompletionProvider, StepDefinition, StepResult, WorkflowError};

#[derive(Debug, Clone)]
pub struct StepRunner {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl StepRunner {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drive `result` from pending to completed or failed.
    ///
    /// Provider failures and timeouts are recorded on the returned result.
    /// An `Err` means `result` was not pending.
    pub async fn run(
        &self,
        step: &StepDefinition,
        result: StepResult,
        initial_input: &Map<String, Value>,
        step_outputs: &StepOutputs,
    ) -> Result<StepResult, WorkflowError> {
        let running = self.start(step, result, initial_input, step_outputs)?;
        self.complete(step, running).await
    }

    /// Resolve the mapping, render the prompt and move `result` to running
    pub fn start(
        &self,
        step: &StepDefinition,
        mut result: StepResult,
        initial_input: &Map<String, Value>,
        step_outputs: &StepOutputs,
    ) -> Result<StepResult, WorkflowError> {
        let order = step.order();
        let resolution = resolve(Some(step.input_mapping()), initial_input, step_outputs);
        let prompt = step.prompt().render(&resolution.values);

        for gap in &resolution.gaps {
            warn!(
                step = order,
                variable = %gap.variable,
                source = %gap.source,
                reason = ?gap.reason,
                "Variable left unresolved"
            );
        }

        result.mark_running(resolution, prompt)?;
        Ok(result)
    }

    /// Send the rendered prompt of a running `result` to the provider
    pub async fn complete(
        &self,
        step: &StepDefinition,
        mut result: StepResult,
    ) -> Result<StepResult, WorkflowError> {
        let order = step.order();
        let prompt = result.rendered_prompt().unwrap_or_default().to_string();
        debug!(step = order, prompt_len = prompt.len(), "Calling completion provider");

        match tokio::time::timeout(self.timeout, self.provider.complete(&prompt)).await {
            Ok(Ok(completion)) => result.mark_completed(completion)?,
            Ok(Err(e)) => {
                warn!(step = order, transient = e.is_transient(), error = %e, "Provider call failed");
                result.mark_failed(e.to_string())?
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                result.mark_failed(WorkflowError::timeout(order, timeout_ms).to_string())?
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::completion::MockCompletionProvider;
    use crate::domain::workflow::{parse_mapping, GapReason};
    use crate::domain::{Completion, DomainError, PromptTemplate, StepId, StepStatus};
    use serde_json::json;

    fn step(template: &str, mapping: &[(&str, &str)]) -> StepDefinition {
        StepDefinition::new(StepId::new("s0").unwrap(), PromptTemplate::parse(template))
            .with_input_mapping(parse_mapping(mapping.iter().copied()))
    }

    fn runner(provider: MockCompletionProvider, timeout_ms: u64) -> StepRunner {
        StepRunner::new(Arc::new(provider), Duration::from_millis(timeout_ms))
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_run_completes_with_rendered_prompt() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .withf(|prompt| prompt.starts_with("Write about rust in 3 lines"))
            .times(1)
            .returning(|_| Ok(Completion::new("done").with_usage(7, 3).with_cost_micros(11)));

        let step = step(
            "Write about {{topic}} in {{ lines }} lines",
            &[("topic", "initial.subject"), ("lines", "initial.lines")],
        );
        let result = runner(provider, 1000)
            .run(
                &step,
                StepResult::pending(step.id().clone(), 0),
                &input(json!({"subject": "rust", "lines": 3})),
                &StepOutputs::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), StepStatus::Completed);
        assert_eq!(result.rendered_prompt(), Some("Write about rust in 3 lines"));
        assert_eq!(result.output(), Some("done"));
        assert_eq!(result.total_tokens(), 10);
        assert_eq!(result.cost_micros(), 11);
        assert_eq!(result.resolved_variables().get("lines").map(String::as_str), Some("3"));
        assert!(result.started_at().is_some());
        assert!(result.completed_at().is_some());
    }

    #[tokio::test]
    async fn test_run_keeps_placeholder_for_gap() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .withf(|prompt| prompt.starts_with("Hi {{name}}"))
            .returning(|_| Ok(Completion::new("hello")));

        let step = step("Hi {{name}}", &[("name", "initial.missing")]);
        let result = runner(provider, 1000)
            .run(
                &step,
                StepResult::pending(step.id().clone(), 0),
                &Map::new(),
                &StepOutputs::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), StepStatus::Completed);
        assert!(result.resolved_variables().is_empty());
        assert_eq!(result.resolution_gaps()[0].reason, GapReason::MissingInitialField);
    }

    #[tokio::test]
    async fn test_provider_error_fails_step() {
        let mut provider = MockCompletionProvider::new();
        provider
            .expect_complete()
            .returning(|_| Err(DomainError::provider("mock", "boom")));

        let step = step("static", &[]);
        let result = runner(provider, 1000)
            .run(
                &step,
                StepResult::pending(step.id().clone(), 0),
                &Map::new(),
                &StepOutputs::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("Provider error: mock - boom"));
        assert!(result.output().is_none());
        assert_eq!(result.total_tokens(), 0);
    }

    #[tokio::test]
    async fn test_timeout_fails_step() {
        #[derive(Debug)]
        struct SlowProvider;

        #[async_trait::async_trait]
        impl CompletionProvider for SlowProvider {
            async fn complete(&self, _prompt: &str) -> Result<Completion, DomainError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Completion::new("too late"))
            }
        }

        let runner = StepRunner::new(Arc::new(SlowProvider), Duration::from_millis(20));
        let step = step("static", &[]);
        let result = runner
            .run(
                &step,
                StepResult::pending(step.id().clone(), 0),
                &Map::new(),
                &StepOutputs::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status(), StepStatus::Failed);
        assert_eq!(result.error(), Some("Timeout in step 0 after 20ms"));
    }

    #[tokio::test]
    async fn test_non_pending_result_is_rejected() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().never();

        let step = step("static", &[]);
        let mut skipped = StepResult::pending(step.id().clone(), 0);
        skipped.mark_skipped().unwrap();

        let result = runner(provider, 1000)
            .run(&step, skipped, &Map::new(), &StepOutputs::new())
            .await;

        assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })));
    }

    #[test]
    fn test_start_renders_without_calling_provider() {
        let mut provider = MockCompletionProvider::new();
        provider.expect_complete().never();

        let step = step("Summarize {{text}}", &[("text", "initial.body")]);
        let running = runner(provider, 1000)
            .start(
                &step,
                StepResult::pending(step.id().clone(), 0),
                &input(json!({"body": "notes"})),
                &StepOutputs::new(),
            )
            .unwrap();

        assert_eq!(running.status(), StepStatus::Running);
        assert_eq!(running.rendered_prompt(), Some("Summarize notes"));
        assert!(running.started_at().is_some());
        assert!(running.output().is_none());
    }
}
