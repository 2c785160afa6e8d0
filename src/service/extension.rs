use tokio_util::sync::CancellationToken;

use super::{Services, bind_path};
use crate::error::{Error, Result};
use crate::store::check_cancelled;
use crate::types::validation::{require, url_key};
use crate::types::{
    Extension, ExtensionCredentials, ExtensionEndpoint, ExtensionQuery, ExtensionService,
};

impl Services {
    pub fn register_extension(
        &self,
        extension: Extension,
        cancel: &CancellationToken,
    ) -> Result<Extension> {
        check_cancelled(cancel)?;
        self.extensions.register_extension(extension)
    }

    pub fn get_extension(&self, id: &str) -> Result<Extension> {
        self.extensions.get_extension(id)
    }

    /// Lists every extension, or evaluates `query` when any of its fields is set.
    pub fn list_extensions(
        &self,
        query: &ExtensionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Extension>> {
        if query.is_empty() {
            self.extensions.list_extensions(cancel)
        } else {
            self.extensions.query_extensions(query, cancel)
        }
    }

    pub fn query_extensions(
        &self,
        query: &ExtensionQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Extension>> {
        self.extensions.query_extensions(query, cancel)
    }

    pub fn update_extension(
        &self,
        id: &str,
        mut extension: Extension,
        cancel: &CancellationToken,
    ) -> Result<Extension> {
        bind_path(&mut extension.id, id, "extension id")?;
        check_cancelled(cancel)?;
        self.extensions.update_extension(extension)
    }

    pub fn delete_extension(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        self.extensions.delete_extension(id)
    }

    pub fn add_service(
        &self,
        extension_id: &str,
        service: ExtensionService,
        cancel: &CancellationToken,
    ) -> Result<ExtensionService> {
        check_cancelled(cancel)?;
        self.extensions.add_service(extension_id, service)
    }

    pub fn get_service(&self, extension_id: &str, id: &str) -> Result<ExtensionService> {
        self.extensions.get_service(extension_id, id)
    }

    pub fn list_services(&self, extension_id: &str) -> Result<Vec<ExtensionService>> {
        self.extensions.list_services(extension_id)
    }

    pub fn update_service(
        &self,
        extension_id: &str,
        id: &str,
        mut service: ExtensionService,
        cancel: &CancellationToken,
    ) -> Result<ExtensionService> {
        bind_path(&mut service.id, id, "service id")?;
        check_cancelled(cancel)?;
        self.extensions.update_service(extension_id, service)
    }

    pub fn delete_service(
        &self,
        extension_id: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        self.extensions.delete_service(extension_id, id)
    }

    pub fn add_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        endpoint: ExtensionEndpoint,
        cancel: &CancellationToken,
    ) -> Result<ExtensionEndpoint> {
        require(&endpoint.url, "endpoint url")?;
        check_cancelled(cancel)?;
        self.extensions
            .add_endpoint(extension_id, service_id, endpoint)
    }

    pub fn get_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        url: &str,
    ) -> Result<ExtensionEndpoint> {
        self.extensions.get_endpoint(extension_id, service_id, url)
    }

    pub fn list_endpoints(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionEndpoint>> {
        self.extensions.list_endpoints(extension_id, service_id)
    }

    pub fn update_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        url: &str,
        mut endpoint: ExtensionEndpoint,
        cancel: &CancellationToken,
    ) -> Result<ExtensionEndpoint> {
        if endpoint.url.is_empty() {
            endpoint.url = url.to_string();
        } else if url_key(&endpoint.url)? != url_key(url)? {
            return Err(Error::bad_request(format!(
                "endpoint url '{}' in body does not match '{url}' in path",
                endpoint.url
            )));
        }
        check_cancelled(cancel)?;
        self.extensions
            .update_endpoint(extension_id, service_id, endpoint)
    }

    pub fn delete_endpoint(
        &self,
        extension_id: &str,
        service_id: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        self.extensions
            .delete_endpoint(extension_id, service_id, url)
    }

    pub fn add_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        credentials: ExtensionCredentials,
        cancel: &CancellationToken,
    ) -> Result<ExtensionCredentials> {
        check_cancelled(cancel)?;
        self.extensions
            .add_credentials(extension_id, service_id, credentials)
    }

    pub fn get_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        id: &str,
    ) -> Result<ExtensionCredentials> {
        self.extensions.get_credentials(extension_id, service_id, id)
    }

    pub fn list_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
    ) -> Result<Vec<ExtensionCredentials>> {
        self.extensions.list_credentials(extension_id, service_id)
    }

    pub fn update_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        id: &str,
        mut credentials: ExtensionCredentials,
        cancel: &CancellationToken,
    ) -> Result<ExtensionCredentials> {
        bind_path(&mut credentials.id, id, "credentials id")?;
        check_cancelled(cancel)?;
        self.extensions
            .update_credentials(extension_id, service_id, credentials)
    }

    pub fn delete_credentials(
        &self,
        extension_id: &str,
        service_id: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel)?;
        self.extensions
            .delete_credentials(extension_id, service_id, id)
    }
}
