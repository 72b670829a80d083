//! PMP Workflow Engine
//!
//! Runs named, ordered chains of prompt steps against a text-completion
//! provider:
//! - Steps map their template variables to the initial input or to earlier
//!   steps' outputs
//! - Every run is persisted as an execution record with per-step results,
//!   token usage and cost
//! - In-memory or PostgreSQL storage, selected by configuration

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use config::ProviderConfig;
use domain::{CompletionProvider, ExecutionRecord, ModelPricing, Prompt, Workflow};
use infrastructure::completion::{HttpClient, OpenAiCompletionProvider};
use infrastructure::services::{PromptService, WorkflowService};
use infrastructure::storage::{PostgresConfig, StorageFactory, StorageType};
use infrastructure::workflow::{ExecutionOrchestrator, OrchestratorConfig};
use tracing::{info, warn};

/// Create the application state from configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let provider = create_completion_provider(&config.provider, config.engine.step_timeout_ms)?;

    let storage_type: StorageType = config.storage.backend.parse()?;
    info!("Storage backend: {:?}", storage_type);

    let postgres = config
        .storage
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .map(|url| PostgresConfig::new(url).with_max_connections(config.storage.max_connections));

    let factory = StorageFactory::connect(storage_type, postgres.as_ref()).await?;

    Ok(create_app_state(&factory, provider, OrchestratorConfig::from(&config.engine)).await?)
}

/// Wire services over storages from `factory`
pub async fn create_app_state(
    factory: &StorageFactory,
    provider: Arc<dyn CompletionProvider>,
    engine: OrchestratorConfig,
) -> Result<AppState, domain::DomainError> {
    let workflows = factory.create::<Workflow>("workflows").await?;
    let prompts = factory.create::<Prompt>("prompts").await?;
    let executions = factory.create::<ExecutionRecord>("executions").await?;

    let executor = Arc::new(ExecutionOrchestrator::with_config(
        provider,
        executions.clone(),
        engine,
    ));

    let workflow_service = WorkflowService::new(workflows, prompts.clone(), executions, executor);
    let prompt_service = PromptService::new(prompts);

    Ok(AppState::new(
        Arc::new(workflow_service),
        Arc::new(prompt_service),
    ))
}

/// Build the OpenAI-compatible provider described by `config`
pub fn create_completion_provider(
    config: &ProviderConfig,
    step_timeout_ms: u64,
) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    let api_key = std::env::var(&config.api_key_env).unwrap_or_else(|_| {
        warn!(
            env = %config.api_key_env,
            "Provider API key not set, sending requests without credentials"
        );
        String::new()
    });

    let client = HttpClient::with_timeout(Duration::from_millis(step_timeout_ms))?;
    let pricing = ModelPricing::new(
        &config.model,
        config.input_price_per_1k,
        config.output_price_per_1k,
    );

    let mut provider =
        OpenAiCompletionProvider::new(client, api_key, pricing).with_base_url(&config.base_url);

    if let Some(system_prompt) = &config.system_prompt {
        provider = provider.with_system_prompt(system_prompt);
    }
    if let Some(temperature) = config.temperature {
        provider = provider.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.max_tokens {
        provider = provider.with_max_tokens(max_tokens);
    }

    info!(model = %provider.model(), base_url = %config.base_url, "Completion provider ready");
    Ok(Arc::new(provider))
}
