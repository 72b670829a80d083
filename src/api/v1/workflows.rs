//! Workflow definition and execution endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use crate::api::state::AppState;
use crate::api::types::{
    AddStepApiRequest, ApiError, AsyncQueryParams, CreateWorkflowApiRequest,
    ExecuteWorkflowApiRequest, Json, ListExecutionsResponse, ListWorkflowsResponse,
    ReorderStepsApiRequest, StepResponse, WorkflowResponse,
};
use crate::domain::ExecutionRecord;
use crate::infrastructure::services::AddStepRequest;

/// GET /v1/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ListWorkflowsResponse>, ApiError> {
    let workflows = state.workflow_service.list_workflows().await?;

    let workflows: Vec<WorkflowResponse> = workflows.iter().map(WorkflowResponse::from).collect();
    let total = workflows.len();

    Ok(Json(ListWorkflowsResponse { workflows, total }))
}

/// POST /v1/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowApiRequest>,
) -> Result<(StatusCode, Json<WorkflowResponse>), ApiError> {
    debug!(name = %request.name, "Creating workflow");

    let workflow = state.workflow_service.create_workflow(request.into()).await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(&workflow))))
}

/// GET /v1/workflows/{workflow_id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let workflow = state
        .workflow_service
        .get_workflow(&workflow_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Workflow '{}' not found", workflow_id)))?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// DELETE /v1/workflows/{workflow_id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    debug!(workflow_id = %workflow_id, "Deleting workflow");

    if !state.workflow_service.delete_workflow(&workflow_id).await? {
        return Err(ApiError::not_found(format!(
            "Workflow '{}' not found",
            workflow_id
        )));
    }

    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": workflow_id
    })))
}

/// POST /v1/workflows/{workflow_id}/steps
pub async fn add_step(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(request): Json<AddStepApiRequest>,
) -> Result<(StatusCode, Json<StepResponse>), ApiError> {
    let request = AddStepRequest::try_from(request)?;
    let step = state.workflow_service.add_step(&workflow_id, request).await?;

    Ok((StatusCode::CREATED, Json(StepResponse::from(&step))))
}

/// PUT /v1/workflows/{workflow_id}/steps/order
pub async fn reorder_steps(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(request): Json<ReorderStepsApiRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let workflow = state
        .workflow_service
        .reorder_steps(&workflow_id, &request.step_ids)
        .await?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// POST /v1/workflows/{workflow_id}/execute
///
/// Waits for the run to finish unless `?async=true`, which answers 202 with
/// the pending record.
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Query(params): Query<AsyncQueryParams>,
    Json(request): Json<ExecuteWorkflowApiRequest>,
) -> Result<Response, ApiError> {
    debug!(
        workflow_id = %workflow_id,
        is_async = params.is_async,
        "Executing workflow"
    );

    if params.is_async {
        let record = state
            .workflow_service
            .start_execution(&workflow_id, request.input)
            .await?;

        info!(
            execution_id = %record.id(),
            workflow_id = %workflow_id,
            "Execution queued"
        );
        return Ok((StatusCode::ACCEPTED, Json(record)).into_response());
    }

    let record: ExecutionRecord = state
        .workflow_service
        .execute(&workflow_id, request.input)
        .await?;

    Ok(Json(record).into_response())
}

/// GET /v1/workflows/{workflow_id}/executions
pub async fn list_executions(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<ListExecutionsResponse>, ApiError> {
    let executions = state.workflow_service.list_executions(&workflow_id).await?;
    let total = executions.len();

    Ok(Json(ListExecutionsResponse { executions, total }))
}
