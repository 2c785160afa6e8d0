use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::handler::Handler;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, on};
use axum::{Extension, Router};
use serde::Serialize;

use super::body::{Format, Reply};
use super::openapi::{self, ApiDocs, Body, Operation, Verb};
use super::{codesets, extensions, runnables, workflows};
use crate::service::Services;

pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

async fn health() -> &'static str {
    "OK"
}

async fn version(format: Format) -> impl IntoResponse {
    Reply::ok(
        format,
        VersionInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

/// A documented operation and the handler serving it.
struct ApiRoute {
    operation: Operation,
    handler: MethodRouter<Arc<AppState>>,
}

fn api<H, T>(operation: Operation, handler: H) -> ApiRoute
where
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    ApiRoute {
        handler: on(operation.verb.filter(), handler),
        operation,
    }
}

const EXTENSION_QUERY: &[&str] = &[
    "extension_id",
    "product",
    "version_constraint",
    "zone",
    "service_id",
    "service_resource",
    "service_category",
    "endpoint_url",
    "endpoint_type",
    "credentials_id",
    "credentials_scope",
    "scope_project",
    "scope_user",
    "strict_labels",
];

const SERVICE: &str = "/extensions/{extension_id}/services";
const SERVICE_ITEM: &str = "/extensions/{extension_id}/services/{service_id}";
const ENDPOINT: &str = "/extensions/{extension_id}/services/{service_id}/endpoints";
const ENDPOINT_ITEM: &str = "/extensions/{extension_id}/services/{service_id}/endpoints/{url}";
const CREDENTIALS: &str = "/extensions/{extension_id}/services/{service_id}/credentials";
const CREDENTIALS_ITEM: &str = "/extensions/{extension_id}/services/{service_id}/credentials/{id}";

/// Every API operation. The router and the OpenAPI documents are both built from this.
fn api_routes() -> Vec<ApiRoute> {
    use Verb::{Delete, Get, Post, Put};

    vec![
        // Codesets
        api(
            Operation::new(Get, "/codesets", "listCodesets", "codeset", "List codesets")
                .query(&["project", "label"])
                .returns(Body::Many("Codeset")),
            codesets::list_codesets,
        ),
        api(
            Operation::new(Post, "/codesets", "registerCodeset", "codeset", "Register a codeset")
                .accepts("Codeset")
                .returns(Body::One("Codeset")),
            codesets::register_codeset,
        ),
        api(
            Operation::new(Get, "/codesets/{project}/{name}", "getCodeset", "codeset", "Get a codeset")
                .returns(Body::One("Codeset")),
            codesets::get_codeset,
        ),
        api(
            Operation::new(Delete, "/codesets/{project}/{name}", "deleteCodeset", "codeset", "Delete a codeset"),
            codesets::delete_codeset,
        ),
        // Projects
        api(
            Operation::new(Get, "/projects", "listProjects", "project", "List projects")
                .returns(Body::Many("Project")),
            codesets::list_projects,
        ),
        api(
            Operation::new(Get, "/projects/{name}", "getProject", "project", "Get a project")
                .returns(Body::One("Project")),
            codesets::get_project,
        ),
        api(
            Operation::new(Delete, "/projects/{name}", "deleteProject", "project", "Delete a project and its codesets"),
            codesets::delete_project,
        ),
        // Runnables
        api(
            Operation::new(Get, "/runnables", "listRunnables", "runnable", "List runnables")
                .query(&["id", "name", "kind"])
                .returns(Body::Many("Runnable")),
            runnables::list_runnables,
        ),
        api(
            Operation::new(Post, "/runnables", "registerRunnable", "runnable", "Register a runnable")
                .accepts("Runnable")
                .returns(Body::One("Runnable")),
            runnables::register_runnable,
        ),
        api(
            Operation::new(Get, "/runnables/{runnableNameOrId}", "getRunnable", "runnable", "Get a runnable by name or id")
                .returns(Body::One("Runnable")),
            runnables::get_runnable,
        ),
        // Workflows
        api(
            Operation::new(Get, "/workflows", "listWorkflows", "workflow", "List workflows")
                .query(&["name"])
                .returns(Body::Many("Workflow")),
            workflows::list_workflows,
        ),
        api(
            Operation::new(Post, "/workflows", "registerWorkflow", "workflow", "Register a workflow")
                .accepts("Workflow")
                .returns(Body::One("Workflow")),
            workflows::register_workflow,
        ),
        api(
            Operation::new(Get, "/workflows/{workflowNameOrId}", "getWorkflow", "workflow", "Get a workflow by name or id")
                .returns(Body::One("Workflow")),
            workflows::get_workflow,
        ),
        // Extensions
        api(
            Operation::new(Get, "/extensions", "listExtensions", "extension", "List or query extensions")
                .query(EXTENSION_QUERY)
                .returns(Body::Many("Extension")),
            extensions::list_extensions,
        ),
        api(
            Operation::new(Post, "/extensions", "registerExtension", "extension", "Register an extension")
                .accepts("Extension")
                .returns(Body::One("Extension")),
            extensions::register_extension,
        ),
        api(
            Operation::new(Get, "/extensions/{extension_id}", "getExtension", "extension", "Get an extension")
                .returns(Body::One("Extension")),
            extensions::get_extension,
        ),
        api(
            Operation::new(Put, "/extensions/{extension_id}", "updateExtension", "extension", "Update an extension")
                .accepts("Extension")
                .returns(Body::One("Extension")),
            extensions::update_extension,
        ),
        api(
            Operation::new(Delete, "/extensions/{extension_id}", "deleteExtension", "extension", "Delete an extension"),
            extensions::delete_extension,
        ),
        // Services
        api(
            Operation::new(Post, SERVICE, "addService", "extension", "Add a service to an extension")
                .accepts("ExtensionService")
                .returns(Body::One("ExtensionService")),
            extensions::add_service,
        ),
        api(
            Operation::new(Get, SERVICE, "listServices", "extension", "List extension services")
                .returns(Body::Many("ExtensionService")),
            extensions::list_services,
        ),
        api(
            Operation::new(Get, SERVICE_ITEM, "getService", "extension", "Get a service")
                .returns(Body::One("ExtensionService")),
            extensions::get_service,
        ),
        api(
            Operation::new(Put, SERVICE_ITEM, "updateService", "extension", "Update a service")
                .accepts("ExtensionService")
                .returns(Body::One("ExtensionService")),
            extensions::update_service,
        ),
        api(
            Operation::new(Delete, SERVICE_ITEM, "deleteService", "extension", "Delete a service"),
            extensions::delete_service,
        ),
        // Endpoints
        api(
            Operation::new(Post, ENDPOINT, "addEndpoint", "extension", "Add an endpoint to a service")
                .accepts("ExtensionEndpoint")
                .returns(Body::One("ExtensionEndpoint")),
            extensions::add_endpoint,
        ),
        api(
            Operation::new(Get, ENDPOINT, "listEndpoints", "extension", "List service endpoints")
                .returns(Body::Many("ExtensionEndpoint")),
            extensions::list_endpoints,
        ),
        api(
            Operation::new(Get, ENDPOINT_ITEM, "getEndpoint", "extension", "Get an endpoint by URL")
                .returns(Body::One("ExtensionEndpoint")),
            extensions::get_endpoint,
        ),
        api(
            Operation::new(Put, ENDPOINT_ITEM, "updateEndpoint", "extension", "Update an endpoint")
                .accepts("ExtensionEndpoint")
                .returns(Body::One("ExtensionEndpoint")),
            extensions::update_endpoint,
        ),
        api(
            Operation::new(Delete, ENDPOINT_ITEM, "deleteEndpoint", "extension", "Delete an endpoint"),
            extensions::delete_endpoint,
        ),
        // Credentials
        api(
            Operation::new(Post, CREDENTIALS, "addCredentials", "extension", "Add credentials to a service")
                .accepts("ExtensionCredentials")
                .returns(Body::One("ExtensionCredentials")),
            extensions::add_credentials,
        ),
        api(
            Operation::new(Get, CREDENTIALS, "listCredentials", "extension", "List service credentials")
                .returns(Body::Many("ExtensionCredentials")),
            extensions::list_credentials,
        ),
        api(
            Operation::new(Get, CREDENTIALS_ITEM, "getCredentials", "extension", "Get credentials")
                .returns(Body::One("ExtensionCredentials")),
            extensions::get_credentials,
        ),
        api(
            Operation::new(Put, CREDENTIALS_ITEM, "updateCredentials", "extension", "Update credentials")
                .accepts("ExtensionCredentials")
                .returns(Body::One("ExtensionCredentials")),
            extensions::update_credentials,
        ),
        api(
            Operation::new(Delete, CREDENTIALS_ITEM, "deleteCredentials", "extension", "Delete credentials"),
            extensions::delete_credentials,
        ),
        // Info
        api(
            Operation::new(Get, "/version", "getVersion", "info", "Server version")
                .returns(Body::One("Version")),
            version,
        ),
        api(
            Operation::new(Get, "/health", "health", "info", "Liveness probe").returns(Body::Text),
            health,
        ),
    ]
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = api_routes();
    let docs = Arc::new(ApiDocs::new(routes.iter().map(|r| &r.operation)));

    let mut router = Router::new()
        .route("/api/openapi.json", get(openapi::swagger_json))
        .route("/api/openapi.yaml", get(openapi::swagger_yaml))
        .route("/api/openapi3.json", get(openapi::openapi3_json))
        .route("/api/openapi3.yaml", get(openapi::openapi3_yaml));
    for route in routes {
        router = router.route(route.operation.path, route.handler);
    }

    router
        .layer(Extension(docs))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
