use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};

use super::AppState;
use super::blocking::run_blocking;
use super::body::{Format, Payload, Reply};
use super::response::ApiError;
use crate::store::CodesetFilter;
use crate::types::Codeset;

pub async fn list_codesets(
    State(state): State<Arc<AppState>>,
    format: Format,
    filter: Result<Query<CodesetFilter>, QueryRejection>,
) -> impl IntoResponse {
    let Query(filter) = filter.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let services = state.services.clone();
    let codesets = run_blocking(move |cancel| services.list_codesets(&filter, cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, codesets))
}

pub async fn register_codeset(
    State(state): State<Arc<AppState>>,
    format: Format,
    Payload(codeset): Payload<Codeset>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let codeset = run_blocking(move |cancel| services.register_codeset(codeset, cancel)).await?;
    Ok::<_, ApiError>(Reply::created(format, codeset))
}

pub async fn get_codeset(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((project, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let codeset = run_blocking(move |_| services.get_codeset(&project, &name)).await?;
    Ok::<_, ApiError>(Reply::ok(format, codeset))
}

pub async fn delete_codeset(
    State(state): State<Arc<AppState>>,
    Path((project, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| services.delete_codeset(&project, &name, cancel)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    format: Format,
) -> impl IntoResponse {
    let services = state.services.clone();
    let projects = run_blocking(move |cancel| services.list_projects(cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, projects))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let project = run_blocking(move |_| services.get_project(&name)).await?;
    Ok::<_, ApiError>(Reply::ok(format, project))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| services.delete_project(&name, cancel)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
