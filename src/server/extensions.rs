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
use crate::types::{
    Extension, ExtensionCredentials, ExtensionEndpoint, ExtensionQuery, ExtensionService,
};

// Extensions

pub async fn list_extensions(
    State(state): State<Arc<AppState>>,
    format: Format,
    query: Result<Query<ExtensionQuery>, QueryRejection>,
) -> impl IntoResponse {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let services = state.services.clone();
    let extensions = run_blocking(move |cancel| services.list_extensions(&query, cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, extensions))
}

pub async fn register_extension(
    State(state): State<Arc<AppState>>,
    format: Format,
    Payload(extension): Payload<Extension>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let extension =
        run_blocking(move |cancel| services.register_extension(extension, cancel)).await?;
    Ok::<_, ApiError>(Reply::created(format, extension))
}

pub async fn get_extension(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let extension = run_blocking(move |_| services.get_extension(&id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, extension))
}

pub async fn update_extension(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(id): Path<String>,
    Payload(extension): Payload<Extension>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let extension =
        run_blocking(move |cancel| services.update_extension(&id, extension, cancel)).await?;
    Ok::<_, ApiError>(Reply::ok(format, extension))
}

pub async fn delete_extension(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| services.delete_extension(&id, cancel)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Services

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(extension_id): Path<String>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let list = run_blocking(move |_| services.list_services(&extension_id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, list))
}

pub async fn add_service(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path(extension_id): Path<String>,
    Payload(service): Payload<ExtensionService>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let service =
        run_blocking(move |cancel| services.add_service(&extension_id, service, cancel)).await?;
    Ok::<_, ApiError>(Reply::created(format, service))
}

pub async fn get_service(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let service = run_blocking(move |_| services.get_service(&extension_id, &id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, service))
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, id)): Path<(String, String)>,
    Payload(service): Payload<ExtensionService>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let service = run_blocking(move |cancel| {
        services.update_service(&extension_id, &id, service, cancel)
    })
    .await?;
    Ok::<_, ApiError>(Reply::ok(format, service))
}

pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Path((extension_id, id)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| services.delete_service(&extension_id, &id, cancel)).await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Endpoints

pub async fn list_endpoints(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let list = run_blocking(move |_| services.list_endpoints(&extension_id, &service_id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, list))
}

pub async fn add_endpoint(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id)): Path<(String, String)>,
    Payload(endpoint): Payload<ExtensionEndpoint>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let endpoint = run_blocking(move |cancel| {
        services.add_endpoint(&extension_id, &service_id, endpoint, cancel)
    })
    .await?;
    Ok::<_, ApiError>(Reply::created(format, endpoint))
}

pub async fn get_endpoint(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id, url)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let endpoint =
        run_blocking(move |_| services.get_endpoint(&extension_id, &service_id, &url)).await?;
    Ok::<_, ApiError>(Reply::ok(format, endpoint))
}

pub async fn update_endpoint(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id, url)): Path<(String, String, String)>,
    Payload(endpoint): Payload<ExtensionEndpoint>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let endpoint = run_blocking(move |cancel| {
        services.update_endpoint(&extension_id, &service_id, &url, endpoint, cancel)
    })
    .await?;
    Ok::<_, ApiError>(Reply::ok(format, endpoint))
}

pub async fn delete_endpoint(
    State(state): State<Arc<AppState>>,
    Path((extension_id, service_id, url)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| {
        services.delete_endpoint(&extension_id, &service_id, &url, cancel)
    })
    .await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Credentials

pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let list =
        run_blocking(move |_| services.list_credentials(&extension_id, &service_id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, list))
}

pub async fn add_credentials(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id)): Path<(String, String)>,
    Payload(credentials): Payload<ExtensionCredentials>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let credentials = run_blocking(move |cancel| {
        services.add_credentials(&extension_id, &service_id, credentials, cancel)
    })
    .await?;
    Ok::<_, ApiError>(Reply::created(format, credentials))
}

pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id, id)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let credentials =
        run_blocking(move |_| services.get_credentials(&extension_id, &service_id, &id)).await?;
    Ok::<_, ApiError>(Reply::ok(format, credentials))
}

pub async fn update_credentials(
    State(state): State<Arc<AppState>>,
    format: Format,
    Path((extension_id, service_id, id)): Path<(String, String, String)>,
    Payload(credentials): Payload<ExtensionCredentials>,
) -> impl IntoResponse {
    let services = state.services.clone();
    let credentials = run_blocking(move |cancel| {
        services.update_credentials(&extension_id, &service_id, &id, credentials, cancel)
    })
    .await?;
    Ok::<_, ApiError>(Reply::ok(format, credentials))
}

pub async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    Path((extension_id, service_id, id)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let services = state.services.clone();
    run_blocking(move |cancel| {
        services.delete_credentials(&extension_id, &service_id, &id, cancel)
    })
    .await?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
