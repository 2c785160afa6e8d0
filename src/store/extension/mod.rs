//! In-memory extension registry.
//!
//! The tree is held as nested ordered maps behind a single `RwLock` together with its
//! secondary indexes. Children keep `extension_id`/`service_id` back-references as plain
//! identifiers; ownership is the parent's map. Every write validates the complete change
//! before touching the tree, so a failed write leaves no trace.

mod index;
mod query;

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use self::index::RegistryIndex;
use super::{ExtensionStore, check_cancelled, read_lock, write_lock};
use crate::error::{Error, Result};
use crate::types::timestamp::{now, refreshed};
use crate::types::validation::{
    MAX_DESCRIPTION_LEN, MAX_ID_LEN, MAX_NAME_LEN, require, url_key, validate_configuration,
    validate_identifier, validate_max_len,
};
use crate::types::*;

const STORE: &str = "extension";

/// Generates an opaque identifier of the form `<prefix>-<8 hex chars>`.
pub(crate) fn generate_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let prefix = if validate_identifier(prefix, "prefix", MAX_ID_LEN).is_ok() {
        &prefix[..prefix.len().min(MAX_ID_LEN - 10)]
    } else {
        "id"
    };
    format!("{prefix}-{}", &suffix[..8])
}

/// Unparseable versions stay on the record but never satisfy a strict version query.
fn parsed_version(text: &str) -> Option<Version> {
    if text.trim().is_empty() {
        return None;
    }
    match parse_version(text) {
        Ok(version) => Some(version),
        Err(_) => {
            debug!("Extension version '{text}' is not SemVer");
            None
        }
    }
}

/// Fills an empty back-reference from the parent path; rejects a mismatching one.
fn bind(field: &mut String, parent: &str, what: &str) -> Result<()> {
    if field.is_empty() {
        *field = parent.to_string();
        return Ok(());
    }
    if field != parent {
        return Err(Error::bad_request(format!(
            "{what} '{field}' does not match parent '{parent}'"
        )));
    }
    Ok(())
}

fn validate_extension(extension: &Extension) -> Result<Option<Version>> {
    if !extension.id.is_empty() {
        validate_identifier(&extension.id, "extension id", MAX_ID_LEN)?;
    }
    validate_max_len(&extension.product, "product", MAX_NAME_LEN)?;
    validate_max_len(&extension.description, "description", MAX_DESCRIPTION_LEN)?;
    validate_max_len(&extension.zone, "zone", MAX_NAME_LEN)?;
    validate_configuration(&extension.configuration, "configuration")?;
    Ok(parsed_version(&extension.version))
}

fn validate_service(service: &ExtensionService) -> Result<()> {
    if !service.id.is_empty() {
        validate_identifier(&service.id, "service id", MAX_ID_LEN)?;
    }
    if !service.resource.is_empty() {
        validate_identifier(&service.resource, "resource", MAX_NAME_LEN)?;
    }
    if !service.category.is_empty() {
        validate_identifier(&service.category, "category", MAX_NAME_LEN)?;
    }
    validate_max_len(&service.description, "description", MAX_DESCRIPTION_LEN)?;
    validate_configuration(&service.configuration, "configuration")
}

fn validate_endpoint(endpoint: &ExtensionEndpoint) -> Result<String> {
    require(&endpoint.url, "endpoint url")?;
    validate_configuration(&endpoint.configuration, "configuration")?;
    url_key(&endpoint.url)
}

fn validate_credentials(credentials: &ExtensionCredentials) -> Result<()> {
    if !credentials.id.is_empty() {
        validate_identifier(&credentials.id, "credentials id", MAX_ID_LEN)?;
    }
    for project in &credentials.projects {
        require(project, "credentials project")?;
    }
    for user in &credentials.users {
        require(user, "credentials user")?;
    }
    match credentials.scope {
        CredentialsScope::Global => {
            if !credentials.projects.is_empty() || !credentials.users.is_empty() {
                return Err(Error::bad_request(
                    "global credentials cannot be restricted to projects or users",
                ));
            }
        }
        CredentialsScope::Project => {
            if credentials.projects.is_empty() {
                return Err(Error::bad_request(
                    "project credentials must list at least one project",
                ));
            }
            if !credentials.users.is_empty() {
                return Err(Error::bad_request(
                    "project credentials cannot be restricted to users",
                ));
            }
        }
        CredentialsScope::User => {
            if credentials.users.is_empty() {
                return Err(Error::bad_request(
                    "user credentials must list at least one user",
                ));
            }
        }
    }
    Ok(())
}

fn not_found_extension(id: &str) -> Error {
    Error::not_found(format!("extension '{id}' not found"))
}

fn not_found_service(extension_id: &str, id: &str) -> Error {
    Error::not_found(format!(
        "service '{id}' not found in extension '{extension_id}'"
    ))
}

#[derive(Debug, Clone)]
struct ServiceNode {
    service: ExtensionService,
    /// Keyed by the normalized URL.
    endpoints: BTreeMap<String, ExtensionEndpoint>,
    credentials: BTreeMap<String, ExtensionCredentials>,
}

impl ServiceNode {
    /// Validates `service` and its nested children and builds a detached node for it.
    fn build(extension_id: &str, mut service: ExtensionService, at: DateTime<Utc>) -> Result<Self> {
        validate_service(&service)?;
        bind(&mut service.extension_id, extension_id, "service extension_id")?;
        if service.id.is_empty() {
            let prefix = if service.resource.is_empty() {
                "service"
            } else {
                &service.resource
            };
            service.id = generate_id(prefix);
        }
        service.status = Some(ExtensionStatus {
            registered: at,
            updated: at,
        });

        let endpoints = std::mem::take(&mut service.endpoints);
        let credentials = std::mem::take(&mut service.credentials);
        let mut node = Self {
            service,
            endpoints: BTreeMap::new(),
            credentials: BTreeMap::new(),
        };
        for endpoint in endpoints {
            node.insert_endpoint(endpoint)?;
        }
        for credentials in credentials {
            node.insert_credentials(credentials, at)?;
        }
        Ok(node)
    }

    fn insert_endpoint(&mut self, mut endpoint: ExtensionEndpoint) -> Result<ExtensionEndpoint> {
        let key = validate_endpoint(&endpoint)?;
        bind(
            &mut endpoint.extension_id,
            &self.service.extension_id,
            "endpoint extension_id",
        )?;
        bind(&mut endpoint.service_id, &self.service.id, "endpoint service_id")?;
        if self.endpoints.contains_key(&key) {
            return Err(Error::conflict(format!(
                "endpoint '{}' already exists in service '{}'",
                endpoint.url, self.service.id
            )));
        }
        self.endpoints.insert(key, endpoint.clone());
        Ok(endpoint)
    }

    /// Prepares a credentials record for insertion into this service without
    /// inserting it.
    fn prepare_credentials(
        &self,
        mut credentials: ExtensionCredentials,
        at: DateTime<Utc>,
    ) -> Result<ExtensionCredentials> {
        validate_credentials(&credentials)?;
        bind(
            &mut credentials.extension_id,
            &self.service.extension_id,
            "credentials extension_id",
        )?;
        bind(
            &mut credentials.service_id,
            &self.service.id,
            "credentials service_id",
        )?;
        if credentials.id.is_empty() {
            credentials.id = generate_id("credentials");
        }
        if self.credentials.contains_key(&credentials.id) {
            return Err(Error::conflict(format!(
                "credentials '{}' already exist in service '{}'",
                credentials.id, self.service.id
            )));
        }
        credentials.status = Some(CredentialsStatus {
            created: at,
            updated: at,
        });
        Ok(credentials)
    }

    fn insert_credentials(
        &mut self,
        credentials: ExtensionCredentials,
        at: DateTime<Utc>,
    ) -> Result<ExtensionCredentials> {
        let credentials = self.prepare_credentials(credentials, at)?;
        if credentials.is_default {
            self.clear_defaults(&credentials, at);
        }
        self.credentials
            .insert(credentials.id.clone(), credentials.clone());
        Ok(credentials)
    }

    /// Clears the `default` flag on every other record overlapping `winner`.
    fn clear_defaults(&mut self, winner: &ExtensionCredentials, at: DateTime<Utc>) {
        for other in self.credentials.values_mut() {
            if other.id != winner.id && other.is_default && other.overlaps(winner) {
                debug!(
                    "Clearing default flag on credentials {} superseded by {}",
                    other.id, winner.id
                );
                other.is_default = false;
                if let Some(status) = other.status.as_mut() {
                    status.updated = refreshed(status.updated).max(at);
                }
            }
        }
    }

    fn snapshot(&self) -> ExtensionService {
        let mut service = self.service.clone();
        service.endpoints = self.endpoints.values().cloned().collect();
        service.credentials = self.credentials.values().cloned().collect();
        service
    }

    fn index_into(&self, index: &mut RegistryIndex) {
        index.insert_service(&self.service);
        for credentials in self.credentials.values() {
            index.insert_credentials(credentials);
        }
    }

    fn unindex_from(&self, index: &mut RegistryIndex) {
        index.remove_service(&self.service);
        for credentials in self.credentials.values() {
            index.remove_credentials(credentials);
        }
    }
}

#[derive(Debug, Clone)]
struct ExtensionNode {
    extension: Extension,
    version: Option<Version>,
    services: BTreeMap<String, ServiceNode>,
}

impl ExtensionNode {
    fn snapshot(&self) -> Extension {
        let mut extension = self.extension.clone();
        extension.services = self.services.values().map(ServiceNode::snapshot).collect();
        extension
    }

    fn service(&self, id: &str) -> Result<&ServiceNode> {
        self.services
            .get(id)
            .ok_or_else(|| not_found_service(&self.extension.id, id))
    }

    fn service_mut(&mut self, id: &str) -> Result<&mut ServiceNode> {
        let extension_id = &self.extension.id;
        self.services
            .get_mut(id)
            .ok_or_else(|| not_found_service(extension_id, id))
    }

    fn index_into(&self, index: &mut RegistryIndex) {
        index.insert_extension(&self.extension);
        for service in self.services.values() {
            service.index_into(index);
        }
    }

    fn unindex_from(&self, index: &mut RegistryIndex) {
        index.remove_extension(&self.extension);
        for service in self.services.values() {
            service.unindex_from(index);
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    extensions: BTreeMap<String, ExtensionNode>,
    index: RegistryIndex,
}

impl Registry {
    fn extension(&self, id: &str) -> Result<&ExtensionNode> {
        self.extensions
            .get(id)
            .ok_or_else(|| not_found_extension(id))
    }

    fn service(&self, extension_id: &str, id: &str) -> Result<&ServiceNode> {
        self.extension(extension_id)?.service(id)
    }
}

fn extension_mut<'a>(
    extensions: &'a mut BTreeMap<String, ExtensionNode>,
    id: &str,
) -> Result<&'a mut ExtensionNode> {
    extensions
        .get_mut(id)
        .ok_or_else(|| not_found_extension(id))
}

fn service_mut<'a>(
    extensions: &'a mut BTreeMap<String, ExtensionNode>,
    extension_id: &str,
    id: &str,
) -> Result<&'a mut ServiceNode> {
    extension_mut(extensions, extension_id)?.service_mut(id)
}

/// Concurrency-safe in-memory implementation of [`ExtensionStore`].
#[derive(Debug, Default)]
pub struct MemoryExtensionStore {
    registry: RwLock<Registry>,
}

impl MemoryExtensionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtensionStore for MemoryExtensionStore {
    fn register_extension(&self, mut extension: Extension) -> Result<Extension> {
        let version = validate_extension(&extension)?;
        let services = std::mem::take(&mut extension.services);

        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;

        if extension.id.is_empty() {
            let prefix = if extension.product.is_empty() {
                "extension"
            } else {
                &extension.product
            };
            let mut id = generate_id(prefix);
            while registry.extensions.contains_key(&id) {
                id = generate_id(prefix);
            }
            extension.id = id;
        } else if registry.extensions.contains_key(&extension.id) {
            return Err(Error::conflict(format!(
                "extension '{}' already exists",
                extension.id
            )));
        }

        let at = now();
        extension.status = Some(ExtensionStatus {
            registered: at,
            updated: at,
        });
        let mut node = ExtensionNode {
            extension,
            version,
            services: BTreeMap::new(),
        };
        for service in services {
            let service = ServiceNode::build(&node.extension.id, service, at)?;
            if node.services.contains_key(&service.service.id) {
                return Err(Error::conflict(format!(
                    "service '{}' is listed more than once",
                    service.service.id
                )));
            }
            node.services.insert(service.service.id.clone(), service);
        }

        node.index_into(&mut registry.index);
        let snapshot = node.snapshot();
        registry.extensions.insert(snapshot.id.clone(), node);

        info!(
            "Registered extension {} ({} services)",
            snapshot.id,
            snapshot.services.len()
        );
        Ok(snapshot)
    }

    fn get_extension(&self, id: &str) -> Result<Extension> {
        let registry = read_lock(&self.registry, STORE);
        Ok(registry.extension(id)?.snapshot())
    }

    fn list_extensions(&self, cancel: &CancellationToken) -> Result<Vec<Extension>> {
        let registry = read_lock(&self.registry, STORE);
        let mut extensions = Vec::with_capacity(registry.extensions.len());
        for node in registry.extensions.values() {
            check_cancelled(cancel)?;
            extensions.push(node.snapshot());
        }
        Ok(extensions)
    }

    fn update_extension(&self, extension: Extension) -> Result<Extension> {
        require(&extension.id, "extension id")?;
        let version = validate_extension(&extension)?;

        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = extension_mut(&mut registry.extensions, &extension.id)?;

        registry.index.remove_extension(&node.extension);
        let current = &mut node.extension;
        current.product = extension.product;
        current.version = extension.version;
        current.description = extension.description;
        current.zone = extension.zone;
        current.configuration = extension.configuration;
        if let Some(status) = current.status.as_mut() {
            status.updated = refreshed(status.updated);
        }
        node.version = version;
        registry.index.insert_extension(&node.extension);

        debug!("Updated extension {}", node.extension.id);
        Ok(node.snapshot())
    }

    fn delete_extension(&self, id: &str) -> Result<()> {
        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = registry
            .extensions
            .remove(id)
            .ok_or_else(|| not_found_extension(id))?;
        node.unindex_from(&mut registry.index);

        info!("Deleted extension {id} ({} services)", node.services.len());
        Ok(())
    }

    fn add_service(
        &self,
        extension_id: &str,
        service: ExtensionService,
    ) -> Result<ExtensionService> {
        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let extension = extension_mut(&mut registry.extensions, extension_id)?;

        let node = ServiceNode::build(extension_id, service, now())?;
        if extension.services.contains_key(&node.service.id) {
            return Err(Error::conflict(format!(
                "service '{}' already exists in extension '{extension_id}'",
                node.service.id
            )));
        }
        node.index_into(&mut registry.index);
        let snapshot = node.snapshot();
        extension.services.insert(snapshot.id.clone(), node);

        debug!("Added service {} to extension {extension_id}", snapshot.id);
        Ok(snapshot)
    }

    fn get_service(&self, extension_id: &str, id: &str) -> Result<ExtensionService> {
        let registry = read_lock(&self.registry, STORE);
        Ok(registry.service(extension_id, id)?.snapshot())
    }

    fn list_services(&self, extension_id: &str) -> Result<Vec<ExtensionService>> {
        let registry = read_lock(&self.registry, STORE);
        Ok(registry
            .extension(extension_id)?
            .services
            .values()
            .map(ServiceNode::snapshot)
            .collect())
    }

    fn update_service(
        &self,
        extension_id: &str,
        mut service: ExtensionService,
    ) -> Result<ExtensionService> {
        require(&service.id, "service id")?;
        validate_service(&service)?;
        bind(&mut service.extension_id, extension_id, "service extension_id")?;

        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = service_mut(&mut registry.extensions, extension_id, &service.id)?;

        registry.index.remove_service(&node.service);
        let current = &mut node.service;
        current.resource = service.resource;
        current.category = service.category;
        current.auth_required = service.auth_required;
        current.description = service.description;
        current.configuration = service.configuration;
        if let Some(status) = current.status.as_mut() {
            status.updated = refreshed(status.updated);
        }
        registry.index.insert_service(&node.service);

        debug!("Updated service {extension_id}/{}", node.service.id);
        Ok(node.snapshot())
    }

    fn delete_service(&self, extension_id: &str, id: &str) -> Result<()> {
        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let extension = extension_mut(&mut registry.extensions, extension_id)?;
        let node = extension
            .services
            .remove(id)
            .ok_or_else(|| not_found_service(extension_id, id))?;
        node.unindex_from(&mut registry.index);

        debug!("Deleted service {extension_id}/{id}");
        Ok(())
    }

    fn add_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        endpoint: ExtensionEndpoint,
    ) -> Result<ExtensionEndpoint> {
        let mut guard = write_lock(&self.registry, STORE);
        let node = service_mut(&mut guard.extensions, extension_id, service_id)?;
        let endpoint = node.insert_endpoint(endpoint)?;

        debug!(
            "Added endpoint {} to service {extension_id}/{service_id}",
            endpoint.url
        );
        Ok(endpoint)
    }

    fn get_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        url: &str,
    ) -> Result<ExtensionEndpoint> {
        let key = url_key(url)?;
        let registry = read_lock(&self.registry, STORE);
        registry
            .service(extension_id, service_id)?
            .endpoints
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!(
                    "endpoint '{url}' not found in service '{service_id}'"
                ))
            })
    }

    fn list_endpoints(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionEndpoint>> {
        let registry = read_lock(&self.registry, STORE);
        Ok(registry
            .service(extension_id, service_id)?
            .endpoints
            .values()
            .cloned()
            .collect())
    }

    fn update_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        mut endpoint: ExtensionEndpoint,
    ) -> Result<ExtensionEndpoint> {
        let key = validate_endpoint(&endpoint)?;
        bind(
            &mut endpoint.extension_id,
            extension_id,
            "endpoint extension_id",
        )?;
        bind(&mut endpoint.service_id, service_id, "endpoint service_id")?;

        let mut guard = write_lock(&self.registry, STORE);
        let node = service_mut(&mut guard.extensions, extension_id, service_id)?;
        let current = node.endpoints.get_mut(&key).ok_or_else(|| {
            Error::not_found(format!(
                "endpoint '{}' not found in service '{service_id}'",
                endpoint.url
            ))
        })?;
        current.endpoint_type = endpoint.endpoint_type;
        current.configuration = endpoint.configuration;

        debug!(
            "Updated endpoint {} of service {extension_id}/{service_id}",
            current.url
        );
        Ok(current.clone())
    }

    fn delete_endpoint(&self, extension_id: &str, service_id: &str, url: &str) -> Result<()> {
        let key = url_key(url)?;
        let mut guard = write_lock(&self.registry, STORE);
        let node = service_mut(&mut guard.extensions, extension_id, service_id)?;
        node.endpoints.remove(&key).ok_or_else(|| {
            Error::not_found(format!(
                "endpoint '{url}' not found in service '{service_id}'"
            ))
        })?;

        debug!("Deleted endpoint {url} of service {extension_id}/{service_id}");
        Ok(())
    }

    fn add_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        credentials: ExtensionCredentials,
    ) -> Result<ExtensionCredentials> {
        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = service_mut(&mut registry.extensions, extension_id, service_id)?;
        let credentials = node.insert_credentials(credentials, now())?;
        registry.index.insert_credentials(&credentials);

        debug!(
            "Added {} credentials {} to service {extension_id}/{service_id}",
            credentials.scope, credentials.id
        );
        Ok(credentials)
    }

    fn get_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        id: &str,
    ) -> Result<ExtensionCredentials> {
        let registry = read_lock(&self.registry, STORE);
        registry
            .service(extension_id, service_id)?
            .credentials
            .get(id)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!(
                    "credentials '{id}' not found in service '{service_id}'"
                ))
            })
    }

    fn list_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionCredentials>> {
        let registry = read_lock(&self.registry, STORE);
        Ok(registry
            .service(extension_id, service_id)?
            .credentials
            .values()
            .cloned()
            .collect())
    }

    fn update_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        mut credentials: ExtensionCredentials,
    ) -> Result<ExtensionCredentials> {
        require(&credentials.id, "credentials id")?;
        validate_credentials(&credentials)?;
        bind(
            &mut credentials.extension_id,
            extension_id,
            "credentials extension_id",
        )?;
        bind(
            &mut credentials.service_id,
            service_id,
            "credentials service_id",
        )?;

        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = service_mut(&mut registry.extensions, extension_id, service_id)?;
        let current = node.credentials.get_mut(&credentials.id).ok_or_else(|| {
            Error::not_found(format!(
                "credentials '{}' not found in service '{service_id}'",
                credentials.id
            ))
        })?;

        registry.index.remove_credentials(current);
        current.is_default = credentials.is_default;
        current.scope = credentials.scope;
        current.projects = credentials.projects;
        current.users = credentials.users;
        current.configuration = credentials.configuration;
        let at = match current.status.as_mut() {
            Some(status) => {
                status.updated = refreshed(status.updated);
                status.updated
            }
            None => now(),
        };
        let updated = current.clone();
        registry.index.insert_credentials(&updated);
        if updated.is_default {
            node.clear_defaults(&updated, at);
        }

        debug!(
            "Updated credentials {} of service {extension_id}/{service_id}",
            updated.id
        );
        Ok(updated)
    }

    fn delete_credentials(&self, extension_id: &str, service_id: &str, id: &str) -> Result<()> {
        let mut guard = write_lock(&self.registry, STORE);
        let registry = &mut *guard;
        let node = service_mut(&mut registry.extensions, extension_id, service_id)?;
        let credentials = node.credentials.remove(id).ok_or_else(|| {
            Error::not_found(format!(
                "credentials '{id}' not found in service '{service_id}'"
            ))
        })?;
        registry.index.remove_credentials(&credentials);

        debug!("Deleted credentials {id} of service {extension_id}/{service_id}");
        Ok(())
    }

    fn query_extensions(
        &self,
        query: &ExtensionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Extension>> {
        let registry = read_lock(&self.registry, STORE);
        query::evaluate(&registry, query, cancel)
    }
}
