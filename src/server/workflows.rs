use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};

use super::AppState;
use super::blocking::run_blocking;
use super::body::{Format, Payload, Reply};
use super::response::ApiError;
use crate::store::WorkflowFilter;
use crate::types::Workflow;

pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
    format: Format,
    filter: Result<Query<WorkflowFilter>, QueryRejection>,
) -> impl IntoResponse {
    let Query(filter) = filter.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let services = state.services.clone();
    let workflows = run_blocking(move |cancel| services.list_workflows(&filter, cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, workflows))
}

pub async fn register_workflow(
    State(state): State<Arc<AppState>>,
    format: Format,
    Payload(workflow): Payload<Workflow>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let workflow = run_blocking(move |cancel| services.register_workflow(workflow, cancel)).await?;
    Ok::<_, ApiError>(Reply::created(format, workflow))
}

pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(name_or_id): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let workflow = run_blocking(move |_| services.get_workflow(&name_or_id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, workflow))
}
