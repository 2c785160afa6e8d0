mod codeset;
mod extension;
mod project;
mod runnable;
mod workflow;

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub use codeset::MemoryCodesetStore;
pub use extension::MemoryExtensionStore;
pub use project::MemoryProjectStore;
pub use runnable::MemoryRunnableStore;
pub use workflow::MemoryWorkflowStore;

use crate::error::{Error, Result};
use crate::types::*;

/// The extension registry: extensions → services → endpoints/credentials.
///
/// Children are addressed by their full key path. Every write is applied under one
/// exclusive acquisition, so readers never see a partially-applied subtree.
pub trait ExtensionStore: Send + Sync {
    // Extension operations
    fn register_extension(&self, extension: Extension) -> Result<Extension>;
    fn get_extension(&self, id: &str) -> Result<Extension>;
    fn list_extensions(&self, cancel: &CancellationToken) -> Result<Vec<Extension>>;
    fn update_extension(&self, extension: Extension) -> Result<Extension>;
    fn delete_extension(&self, id: &str) -> Result<()>;

    // Service operations
    fn add_service(
        &self,
        extension_id: &str,
        service: ExtensionService,
    ) -> Result<ExtensionService>;
    fn get_service(&self, extension_id: &str, id: &str) -> Result<ExtensionService>;
    fn list_services(&self, extension_id: &str) -> Result<Vec<ExtensionService>>;
    fn update_service(
        &self,
        extension_id: &str,
        service: ExtensionService,
    ) -> Result<ExtensionService>;
    fn delete_service(&self, extension_id: &str, id: &str) -> Result<()>;

    // Endpoint operations (keyed by URL)
    fn add_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        endpoint: ExtensionEndpoint,
    ) -> Result<ExtensionEndpoint>;
    fn get_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        url: &str,
    ) -> Result<ExtensionEndpoint>;
    fn list_endpoints(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionEndpoint>>;
    fn update_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        endpoint: ExtensionEndpoint,
    ) -> Result<ExtensionEndpoint>;
    fn delete_endpoint(&self, extension_id: &str, service_id: &str, url: &str) -> Result<()>;

    // Credentials operations
    fn add_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        credentials: ExtensionCredentials,
    ) -> Result<ExtensionCredentials>;
    fn get_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        id: &str,
    ) -> Result<ExtensionCredentials>;
    fn list_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionCredentials>>;
    fn update_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        credentials: ExtensionCredentials,
    ) -> Result<ExtensionCredentials>;
    fn delete_credentials(&self, extension_id: &str, service_id: &str, id: &str) -> Result<()>;

    /// Evaluates a compound query and returns the pruned projection of the tree.
    fn query_extensions(
        &self,
        query: &ExtensionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Extension>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodesetFilter {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

pub trait CodesetStore: Send + Sync {
    fn register_codeset(&self, codeset: Codeset) -> Result<Codeset>;
    fn get_codeset(&self, project: &str, name: &str) -> Result<Codeset>;
    fn list_codesets(
        &self,
        filter: &CodesetFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Codeset>>;
    fn delete_codeset(&self, project: &str, name: &str) -> Result<()>;
    /// Removes every codeset of `project`, returning how many were removed.
    fn delete_project_codesets(&self, project: &str) -> Result<usize>;
}

pub trait ProjectStore: Send + Sync {
    fn register_project(&self, project: Project) -> Result<Project>;
    /// Returns the project, registering an empty one if it does not exist yet.
    fn ensure_project(&self, name: &str) -> Result<Project>;
    fn get_project(&self, name: &str) -> Result<Project>;
    fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>>;
    fn delete_project(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnableFilter {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    /// Remaining query parameters, matched against runnable labels.
    #[serde(flatten)]
    pub labels: BTreeMap<String, String>,
}

pub trait RunnableStore: Send + Sync {
    fn register_runnable(&self, runnable: Runnable) -> Result<Runnable>;
    fn get_runnable(&self, name_or_id: &str) -> Result<Runnable>;
    fn list_runnables(
        &self,
        filter: &RunnableFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Runnable>>;
    fn delete_runnable(&self, name_or_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowFilter {
    #[serde(default)]
    pub name: Option<String>,
}

pub trait WorkflowStore: Send + Sync {
    fn register_workflow(&self, workflow: Workflow) -> Result<Workflow>;
    fn get_workflow(&self, name_or_id: &str) -> Result<Workflow>;
    fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Workflow>>;
    fn delete_workflow(&self, name_or_id: &str) -> Result<()>;
}

fn read_lock<'a, T>(lock: &'a RwLock<T>, store: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("{store} store lock poisoned; recovering");
        poisoned.into_inner()
    })
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, store: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("{store} store lock poisoned; recovering");
        poisoned.into_inner()
    })
}

pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
