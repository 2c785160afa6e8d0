use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};

use super::AppState;
use super::blocking::run_blocking;
use super::body::{Format, Payload, Reply};
use super::response::ApiError;
use crate::store::RunnableFilter;
use crate::types::Runnable;

pub async fn list_runnables(
    State(state): State<Arc<AppState>>,
    format: Format,
    filter: Result<Query<RunnableFilter>, QueryRejection>,
) -> impl IntoResponse {
    let Query(filter) = filter.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let services = state.services.clone();
    let runnables = run_blocking(move |cancel| services.list_runnables(&filter, cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, runnables))
}

pub async fn register_runnable(
    State(state): State<Arc<AppState>>,
    format: Format,
    Payload(runnable): Payload<Runnable>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let runnable = run_blocking(move |cancel| services.register_runnable(runnable, cancel)).await?;
    Ok::<_, ApiError>(Reply::created(format, runnable))
}

pub async fn get_runnable(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(name_or_id): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let runnable = run_blocking(move |_| services.get_runnable(&name_or_id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, runnable))
}
