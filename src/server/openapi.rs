//! OpenAPI documents generated from the router's route table.
//!
//! Both a Swagger 2.0 and an OpenAPI 3.0 document are rendered once when the router is
//! built and served as JSON or YAML.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::MethodFilter;
use serde_json::{Map, Value, json};

use super::body::{Format, Reply, YAML_CONTENT_TYPE};

const TITLE: &str = "FuseML Core";
const MEDIA_TYPES: [&str; 2] = ["application/json", YAML_CONTENT_TYPE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
        }
    }

    pub fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// Shape of a request or response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    Empty,
    One(&'static str),
    Many(&'static str),
    Text,
}

/// One documented API operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub verb: Verb,
    pub path: &'static str,
    pub id: &'static str,
    pub tag: &'static str,
    pub summary: &'static str,
    pub request: Option<&'static str>,
    pub response: Body,
    pub query: &'static [&'static str],
}

impl Operation {
    pub fn new(
        verb: Verb,
        path: &'static str,
        id: &'static str,
        tag: &'static str,
        summary: &'static str,
    ) -> Self {
        Self {
            verb,
            path,
            id,
            tag,
            summary,
            request: None,
            response: Body::Empty,
            query: &[],
        }
    }

    pub fn accepts(mut self, schema: &'static str) -> Self {
        self.request = Some(schema);
        self
    }

    pub fn returns(mut self, body: Body) -> Self {
        self.response = body;
        self
    }

    pub fn query(mut self, params: &'static [&'static str]) -> Self {
        self.query = params;
        self
    }

    pub fn success_status(&self) -> u16 {
        match (self.verb, self.response) {
            (Verb::Delete, _) => 204,
            (Verb::Post, Body::One(_)) => 201,
            _ => 200,
        }
    }

    fn path_params(&self) -> impl Iterator<Item = &'static str> {
        self.path.split('/').filter_map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
        })
    }

    fn error_statuses(&self) -> Vec<u16> {
        let mut statuses = Vec::new();
        if self.request.is_some() || !self.query.is_empty() || self.path.contains('{') {
            statuses.push(400);
        }
        if self.path.contains('{') {
            statuses.push(404);
        }
        if self.verb == Verb::Post {
            statuses.push(409);
        }
        statuses
    }
}

fn status_description(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Error",
    }
}

fn reference(prefix: &str, name: &str) -> Value {
    json!({ "$ref": format!("{prefix}{name}") })
}

fn body_schema(prefix: &str, body: Body) -> Option<Value> {
    match body {
        Body::Empty => None,
        Body::One(name) => Some(reference(prefix, name)),
        Body::Many(name) => Some(json!({ "type": "array", "items": reference(prefix, name) })),
        Body::Text => Some(json!({ "type": "string" })),
    }
}

fn string_map() -> Value {
    json!({ "type": "object", "additionalProperties": { "type": "string" } })
}

fn object(properties: Value, required: &[&str]) -> Value {
    let mut schema = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Schemas of every domain type, with references rooted at `prefix`.
fn schemas(prefix: &str) -> Value {
    let r = |name: &str| reference(prefix, name);
    let array = |name: &str| json!({ "type": "array", "items": reference(prefix, name) });
    let string = || json!({ "type": "string" });
    let boolean = || json!({ "type": "boolean" });
    let strings = || json!({ "type": "array", "items": { "type": "string" } });
    let time = || json!({ "type": "string", "format": "date-time" });

    let mut defs = Map::new();
    defs.insert(
        "Error".into(),
        object(json!({ "error": string() }), &["error"]),
    );
    defs.insert(
        "Version".into(),
        object(json!({ "version": string(), "name": string() }), &[]),
    );
    defs.insert(
        "ExtensionStatus".into(),
        object(json!({ "registered": time(), "updated": time() }), &[]),
    );
    defs.insert(
        "CredentialsStatus".into(),
        object(json!({ "created": time(), "updated": time() }), &[]),
    );
    defs.insert(
        "Extension".into(),
        object(json!({
            "id": string(),
            "product": string(),
            "version": string(),
            "description": string(),
            "zone": string(),
            "configuration": string_map(),
            "services": array("ExtensionService"),
            "status": r("ExtensionStatus"),
        }), &[]),
    );
    defs.insert(
        "ExtensionService".into(),
        object(json!({
            "id": string(),
            "extension_id": string(),
            "resource": string(),
            "category": string(),
            "auth_required": boolean(),
            "description": string(),
            "configuration": string_map(),
            "endpoints": array("ExtensionEndpoint"),
            "credentials": array("ExtensionCredentials"),
            "status": r("ExtensionStatus"),
        }), &[]),
    );
    defs.insert(
        "ExtensionEndpoint".into(),
        object(json!({
            "url": string(),
            "extension_id": string(),
            "service_id": string(),
            "type": { "type": "string", "enum": ["internal", "external"] },
            "configuration": string_map(),
        }), &["url"]),
    );
    defs.insert(
        "ExtensionCredentials".into(),
        object(json!({
            "id": string(),
            "extension_id": string(),
            "service_id": string(),
            "default": boolean(),
            "scope": { "type": "string", "enum": ["global", "project", "user"] },
            "projects": strings(),
            "users": strings(),
            "configuration": string_map(),
            "status": r("CredentialsStatus"),
        }), &[]),
    );
    defs.insert(
        "Codeset".into(),
        object(json!({
            "name": string(),
            "project": string(),
            "description": string(),
            "labels": strings(),
            "url": string(),
        }), &["name", "project"]),
    );
    defs.insert(
        "ProjectUser".into(),
        object(json!({ "name": string(), "email": string() }), &["name"]),
    );
    defs.insert(
        "Project".into(),
        object(json!({
            "name": string(),
            "description": string(),
            "users": array("ProjectUser"),
        }), &["name"]),
    );
    defs.insert(
        "RunnableImage".into(),
        object(json!({
            "registryUrl": string(),
            "repository": string(),
            "tag": string(),
        }), &["repository"]),
    );
    defs.insert(
        "RunnableInput".into(),
        object(json!({
            "name": string(),
            "kind": string(),
            "description": string(),
            "optional": boolean(),
            "defaultValue": string(),
            "path": string(),
        }), &["name"]),
    );
    defs.insert(
        "RunnableOutput".into(),
        object(json!({
            "name": string(),
            "kind": string(),
            "description": string(),
            "path": string(),
        }), &["name"]),
    );
    defs.insert(
        "Runnable".into(),
        object(json!({
            "id": string(),
            "name": string(),
            "kind": string(),
            "description": string(),
            "image": r("RunnableImage"),
            "inputs": array("RunnableInput"),
            "outputs": array("RunnableOutput"),
            "labels": string_map(),
            "created": time(),
        }), &["name", "image"]),
    );
    defs.insert(
        "WorkflowInput".into(),
        object(json!({
            "name": string(),
            "description": string(),
            "type": string(),
            "default": string(),
        }), &["name"]),
    );
    defs.insert(
        "WorkflowOutput".into(),
        object(json!({
            "name": string(),
            "description": string(),
            "type": string(),
        }), &["name"]),
    );
    defs.insert(
        "StepInputCodeset".into(),
        object(json!({ "name": string(), "path": string() }), &["name"]),
    );
    defs.insert(
        "StepInput".into(),
        object(json!({
            "name": string(),
            "value": string(),
            "codeset": r("StepInputCodeset"),
        }), &["name"]),
    );
    defs.insert(
        "StepOutputImage".into(),
        object(json!({ "dockerfile": string(), "name": string() }), &[]),
    );
    defs.insert(
        "StepOutput".into(),
        object(json!({ "name": string(), "image": r("StepOutputImage") }), &["name"]),
    );
    defs.insert(
        "StepEnv".into(),
        object(json!({ "name": string(), "value": string() }), &["name"]),
    );
    defs.insert(
        "WorkflowStep".into(),
        object(json!({
            "name": string(),
            "image": string(),
            "inputs": array("StepInput"),
            "outputs": array("StepOutput"),
            "env": array("StepEnv"),
        }), &["name", "image"]),
    );
    defs.insert(
        "Workflow".into(),
        object(json!({
            "id": string(),
            "name": string(),
            "created": time(),
            "description": string(),
            "inputs": array("WorkflowInput"),
            "outputs": array("WorkflowOutput"),
            "steps": array("WorkflowStep"),
        }), &["name", "steps"]),
    );
    Value::Object(defs)
}

fn insert_operation(paths: &mut Map<String, Value>, operation: &Operation, rendered: Value) {
    let item = paths
        .entry(operation.path.to_string())
        .or_insert_with(|| json!({}));
    item[operation.verb.as_str()] = rendered;
}

fn swagger_operation(operation: &Operation) -> Value {
    const PREFIX: &str = "#/definitions/";
    let mut parameters: Vec<Value> = operation
        .path_params()
        .map(|name| json!({ "name": name, "in": "path", "required": true, "type": "string" }))
        .collect();
    parameters.extend(
        operation
            .query
            .iter()
            .map(|name| json!({ "name": name, "in": "query", "required": false, "type": "string" })),
    );
    if let Some(schema) = operation.request {
        parameters.push(json!({
            "name": "body",
            "in": "body",
            "required": true,
            "schema": reference(PREFIX, schema),
        }));
    }

    let mut responses = Map::new();
    let status = operation.success_status();
    let mut success = json!({ "description": status_description(status) });
    if let Some(schema) = body_schema(PREFIX, operation.response) {
        success["schema"] = schema;
    }
    responses.insert(status.to_string(), success);
    for status in operation.error_statuses() {
        responses.insert(
            status.to_string(),
            json!({
                "description": status_description(status),
                "schema": reference(PREFIX, "Error"),
            }),
        );
    }

    json!({
        "operationId": operation.id,
        "tags": [operation.tag],
        "summary": operation.summary,
        "parameters": parameters,
        "responses": responses,
    })
}

fn openapi3_operation(operation: &Operation) -> Value {
    const PREFIX: &str = "#/components/schemas/";
    let content = |schema: Value| -> Value {
        let mut content = Map::new();
        for media in MEDIA_TYPES {
            content.insert(media.to_string(), json!({ "schema": schema.clone() }));
        }
        Value::Object(content)
    };

    let mut parameters: Vec<Value> = operation
        .path_params()
        .map(|name| json!({ "name": name, "in": "path", "required": true, "schema": { "type": "string" } }))
        .collect();
    parameters.extend(operation.query.iter().map(|name| {
        json!({ "name": name, "in": "query", "required": false, "schema": { "type": "string" } })
    }));

    let mut responses = Map::new();
    let status = operation.success_status();
    let mut success = json!({ "description": status_description(status) });
    match operation.response {
        Body::Text => {
            success["content"] = json!({ "text/plain": { "schema": { "type": "string" } } });
        }
        body => {
            if let Some(schema) = body_schema(PREFIX, body) {
                success["content"] = content(schema);
            }
        }
    }
    responses.insert(status.to_string(), success);
    for status in operation.error_statuses() {
        responses.insert(
            status.to_string(),
            json!({
                "description": status_description(status),
                "content": { "application/json": { "schema": reference(PREFIX, "Error") } },
            }),
        );
    }

    let mut rendered = json!({
        "operationId": operation.id,
        "tags": [operation.tag],
        "summary": operation.summary,
        "parameters": parameters,
        "responses": responses,
    });
    if let Some(schema) = operation.request {
        rendered["requestBody"] = json!({
            "required": true,
            "content": content(reference(PREFIX, schema)),
        });
    }
    rendered
}

/// Pre-rendered API documents.
#[derive(Debug, Clone)]
pub struct ApiDocs {
    pub swagger: Value,
    pub openapi3: Value,
}

impl ApiDocs {
    pub fn new<'a>(operations: impl IntoIterator<Item = &'a Operation>) -> Self {
        let info = json!({ "title": TITLE, "version": env!("CARGO_PKG_VERSION") });
        let mut swagger_paths = Map::new();
        let mut openapi3_paths = Map::new();
        for operation in operations {
            insert_operation(&mut swagger_paths, operation, swagger_operation(operation));
            insert_operation(&mut openapi3_paths, operation, openapi3_operation(operation));
        }

        let swagger = json!({
            "swagger": "2.0",
            "info": info,
            "basePath": "/",
            "consumes": MEDIA_TYPES,
            "produces": MEDIA_TYPES,
            "paths": swagger_paths,
            "definitions": schemas("#/definitions/"),
        });
        let openapi3 = json!({
            "openapi": "3.0.3",
            "info": info,
            "paths": openapi3_paths,
            "components": { "schemas": schemas("#/components/schemas/") },
        });
        Self { swagger, openapi3 }
    }
}

fn document(value: Value, format: Format) -> impl IntoResponse {
    ([(header::CACHE_CONTROL, "no-cache")], Reply::ok(format, value))
}

pub async fn swagger_json(Extension(docs): Extension<Arc<ApiDocs>>) -> impl IntoResponse {
    document(docs.swagger.clone(), Format::Json)
}

pub async fn swagger_yaml(Extension(docs): Extension<Arc<ApiDocs>>) -> impl IntoResponse {
    document(docs.swagger.clone(), Format::Yaml)
}

pub async fn openapi3_json(Extension(docs): Extension<Arc<ApiDocs>>) -> impl IntoResponse {
    document(docs.openapi3.clone(), Format::Json)
}

pub async fn openapi3_yaml(Extension(docs): Extension<Arc<ApiDocs>>) -> impl IntoResponse {
    document(docs.openapi3.clone(), Format::Yaml)
}
