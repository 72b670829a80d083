//! Prompt library endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::state::AppState;
use crate::api::types::{
    ApiError, CreatePromptApiRequest, Json, PromptResponse, RenderPromptApiRequest,
    RenderPromptResponse,
};

/// GET /v1/prompts
pub async fn list_prompts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PromptResponse>>, ApiError> {
    let prompts = state.prompt_service.list().await?;
    Ok(Json(prompts.iter().map(PromptResponse::from).collect()))
}

/// POST /v1/prompts
pub async fn create_prompt(
    State(state): State<AppState>,
    Json(request): Json<CreatePromptApiRequest>,
) -> Result<(StatusCode, Json<PromptResponse>), ApiError> {
    let prompt = state.prompt_service.create(request.into()).await?;
    Ok((StatusCode::CREATED, Json(PromptResponse::from(&prompt))))
}

/// GET /v1/prompts/{prompt_id}
pub async fn get_prompt(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> Result<Json<PromptResponse>, ApiError> {
    let prompt = state
        .prompt_service
        .get(&prompt_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Prompt '{}' not found", prompt_id)))?;

    Ok(Json(PromptResponse::from(&prompt)))
}

/// DELETE /v1/prompts/{prompt_id}
pub async fn delete_prompt(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.prompt_service.delete(&prompt_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Prompt '{}' not found", prompt_id)))
    }
}

/// POST /v1/prompts/{prompt_id}/render
pub async fn render_prompt(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
    Json(request): Json<RenderPromptApiRequest>,
) -> Result<Json<RenderPromptResponse>, ApiError> {
    let rendered = state
        .prompt_service
        .render(&prompt_id, &request.variables)
        .await?;

    Ok(Json(rendered.into()))
}
