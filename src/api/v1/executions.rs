//! Execution record endpoints

use axum::extract::{Path, State};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::ExecutionRecord;

/// GET /v1/executions/{execution_id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let record = state.workflow_service.get_execution(&execution_id).await?;
    Ok(Json(record))
}

/// POST /v1/executions/{execution_id}/cancel
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    debug!(execution_id = %execution_id, "Cancelling execution");

    let record = state.workflow_service.cancel_execution(&execution_id).await?;
    Ok(Json(record))
}
