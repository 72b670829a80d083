//! v1 API endpoints

pub mod executions;
pub mod prompts;
pub mod steps;
pub mod workflows;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/workflows",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
        .route(
            "/workflows/{workflow_id}",
            get(workflows::get_workflow).delete(workflows::delete_workflow),
        )
        .route("/workflows/{workflow_id}/steps", post(workflows::add_step))
        .route(
            "/workflows/{workflow_id}/steps/order",
            put(workflows::reorder_steps),
        )
        .route(
            "/workflows/{workflow_id}/execute",
            post(workflows::execute_workflow),
        )
        .route(
            "/workflows/{workflow_id}/executions",
            get(workflows::list_executions),
        )
        .route(
            "/steps/{step_id}",
            patch(steps::update_step).delete(steps::remove_step),
        )
        .route("/executions/{execution_id}", get(executions::get_execution))
        .route(
            "/executions/{execution_id}/cancel",
            post(executions::cancel_execution),
        )
        .route(
            "/prompts",
            get(prompts::list_prompts).post(prompts::create_prompt),
        )
        .route(
            "/prompts/{prompt_id}",
            get(prompts::get_prompt).delete(prompts::delete_prompt),
        )
        .route("/prompts/{prompt_id}/render", post(prompts::render_prompt))
}
