//! Step endpoints addressed by step id

use axum::extract::{Path, State};

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, StepResponse, UpdateStepApiRequest};

/// PATCH /v1/steps/{step_id}
pub async fn update_step(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
    Json(request): Json<UpdateStepApiRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let step = state
        .workflow_service
        .update_step(&step_id, request.input_mapping)
        .await?;

    Ok(Json(StepResponse::from(&step)))
}

/// DELETE /v1/steps/{step_id}
pub async fn remove_step(
    State(state): State<AppState>,
    Path(step_id): Path<String>,
) -> Result<Json<StepResponse>, ApiError> {
    let step = state.workflow_service.remove_step(&step_id).await?;

    Ok(Json(StepResponse::from(&step)))
}
