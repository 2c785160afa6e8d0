//! Compound extension query evaluation.
//!
//! The query narrows candidate extensions through the secondary indexes, then walks
//! each candidate's subtree pruning services, endpoints and credentials. The result
//! is a deep copy built under the caller's read lock.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::index::CredentialsKey;
use super::{ExtensionNode, Registry, ServiceNode};
use crate::error::Result;
use crate::store::check_cancelled;
use crate::types::validation::url_key;
use crate::types::{
    CredentialsScope, EndpointType, Extension, ExtensionCredentials, ExtensionEndpoint,
    ExtensionQuery, ExtensionService, VersionConstraint,
};

/// Treats empty query parameters the same as absent ones.
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The query with its text fields normalized and parsed up front.
struct Plan<'q> {
    extension_id: Option<&'q str>,
    product: Option<&'q str>,
    constraint: Option<VersionConstraint>,
    strict: bool,
    zone_local: Option<BTreeSet<String>>,
    service_id: Option<&'q str>,
    resource: Option<&'q str>,
    category: Option<&'q str>,
    endpoint_key: Option<String>,
    endpoint_type: Option<EndpointType>,
    credentials_id: Option<&'q str>,
    credentials_scope: Option<CredentialsScope>,
    project: Option<&'q str>,
    user: Option<&'q str>,
    matching_credentials: BTreeSet<CredentialsKey>,
}

impl<'q> Plan<'q> {
    fn new(registry: &Registry, query: &'q ExtensionQuery) -> Result<Self> {
        let constraint = given(&query.version_constraint)
            .map(VersionConstraint::parse)
            .transpose()?;
        let endpoint_key = given(&query.endpoint_url).map(url_key).transpose()?;
        let project = given(&query.scope_project);
        let user = given(&query.scope_user);

        Ok(Self {
            extension_id: given(&query.extension_id),
            product: given(&query.product),
            constraint,
            strict: query.strict_labels,
            zone_local: given(&query.zone).map(|zone| registry.index.extensions_in_zone(zone)),
            service_id: given(&query.service_id),
            resource: given(&query.service_resource),
            category: given(&query.service_category),
            endpoint_key,
            endpoint_type: query.endpoint_type,
            credentials_id: given(&query.credentials_id),
            credentials_scope: query.credentials_scope,
            project,
            user,
            matching_credentials: registry.index.credentials_for(project, user),
        })
    }

    fn filters_services(&self) -> bool {
        self.service_id.is_some()
            || self.resource.is_some()
            || self.category.is_some()
            || self.filters_endpoints()
            || self.filters_credentials()
    }

    fn filters_endpoints(&self) -> bool {
        self.endpoint_key.is_some() || self.endpoint_type.is_some()
    }

    fn filters_credentials(&self) -> bool {
        self.credentials_id.is_some() || self.credentials_scope.is_some()
    }

    /// Intersects the index hits of every extension-narrowing field. `None` means
    /// no field narrowed the candidates.
    fn candidates(&self, registry: &Registry) -> Option<BTreeSet<String>> {
        let mut sets = Vec::new();
        if let Some(id) = self.extension_id {
            sets.push(
                registry
                    .extensions
                    .get_key_value(id)
                    .map(|(id, _)| id.clone())
                    .into_iter()
                    .collect::<BTreeSet<_>>(),
            );
        }
        if let Some(product) = self.product {
            sets.push(registry.index.extensions_with_product(product));
        }
        if let Some(resource) = self.resource {
            sets.push(registry.index.extensions_with_resource(resource));
        }
        if let Some(category) = self.category {
            sets.push(registry.index.extensions_with_category(category));
        }

        sets.into_iter()
            .reduce(|acc, set| acc.intersection(&set).cloned().collect())
    }

    fn version_matches(&self, node: &ExtensionNode) -> bool {
        match (&self.constraint, &node.version) {
            (None, _) => true,
            (Some(constraint), Some(version)) => constraint.matches(version),
            (Some(_), None) => !self.strict,
        }
    }

    fn project_extension(&self, node: &ExtensionNode) -> Option<Extension> {
        if !self.version_matches(node) {
            return None;
        }

        let zone_local = self
            .zone_local
            .as_ref()
            .is_some_and(|local| local.contains(&node.extension.id));
        let services: Vec<ExtensionService> = node
            .services
            .values()
            .filter_map(|service| self.project_service(service, zone_local))
            .collect();

        if services.is_empty() && (!node.services.is_empty() || self.filters_services()) {
            return None;
        }
        let mut extension = node.extension.clone();
        extension.services = services;
        Some(extension)
    }

    fn project_service(&self, node: &ServiceNode, zone_local: bool) -> Option<ExtensionService> {
        let service = &node.service;
        if self.service_id.is_some_and(|id| service.id != id)
            || self.resource.is_some_and(|r| service.resource != r)
            || self.category.is_some_and(|c| service.category != c)
        {
            return None;
        }

        let endpoints: Vec<ExtensionEndpoint> = node
            .endpoints
            .iter()
            .filter(|(key, endpoint)| self.endpoint_eligible(key, endpoint, zone_local))
            .map(|(_, endpoint)| endpoint.clone())
            .collect();
        if endpoints.is_empty() && (!node.endpoints.is_empty() || self.filters_endpoints()) {
            return None;
        }

        let credentials = self.best_credentials(node);
        if credentials.is_none() && (service.auth_required || self.filters_credentials()) {
            return None;
        }

        let mut service = service.clone();
        service.endpoints = endpoints;
        service.credentials = credentials.into_iter().collect();
        Some(service)
    }

    fn endpoint_eligible(&self, key: &str, endpoint: &ExtensionEndpoint, zone_local: bool) -> bool {
        if self.endpoint_key.as_deref().is_some_and(|k| k != key) {
            return false;
        }
        if self.endpoint_type.is_some_and(|t| t != endpoint.endpoint_type) {
            return false;
        }
        endpoint.endpoint_type == EndpointType::External || zone_local
    }

    /// Rank of a credentials record for the caller, or `None` if it does not apply.
    /// Higher is more specific.
    fn rank(&self, credentials: &ExtensionCredentials) -> Option<u8> {
        let in_project = |c: &ExtensionCredentials| {
            self.project
                .is_some_and(|p| c.projects.iter().any(|x| x == p))
        };
        match credentials.scope {
            CredentialsScope::Global => Some(0),
            CredentialsScope::Project => in_project(credentials).then_some(1),
            CredentialsScope::User => {
                let user = self.user?;
                if !credentials.users.iter().any(|u| u == user) {
                    return None;
                }
                if credentials.projects.is_empty() {
                    Some(2)
                } else {
                    in_project(credentials).then_some(3)
                }
            }
        }
    }

    fn best_credentials(&self, node: &ServiceNode) -> Option<ExtensionCredentials> {
        let extension_id = &node.service.extension_id;
        let service_id = &node.service.id;
        let start = CredentialsKey::new(extension_id, service_id, "");

        self.matching_credentials
            .range(start..)
            .take_while(|key| key.belongs_to(extension_id, service_id))
            .filter_map(|key| node.credentials.get(&key.id))
            .filter(|c| self.credentials_id.is_none_or(|id| c.id == id))
            .filter(|c| self.credentials_scope.is_none_or(|s| c.scope == s))
            .filter_map(|c| self.rank(c).map(|rank| (rank, c)))
            .max_by_key(|(rank, c)| (*rank, c.is_default, Reverse(c.id.clone())))
            .map(|(_, c)| c.clone())
    }
}

pub(super) fn evaluate(
    registry: &Registry,
    query: &ExtensionQuery,
    cancel: &CancellationToken,
) -> Result<Vec<Extension>> {
    let plan = Plan::new(registry, query)?;
    let candidates = plan.candidates(registry);

    let ids: Vec<&String> = match &candidates {
        Some(ids) => ids.iter().collect(),
        None => registry.extensions.keys().collect(),
    };

    let mut result = Vec::new();
    for id in ids {
        check_cancelled(cancel)?;
        let Some(node) = registry.extensions.get(id) else {
            continue;
        };
        if let Some(extension) = plan.project_extension(node) {
            result.push(extension);
        }
    }

    debug!(
        "Extension query matched {} extensions ({} candidates)",
        result.len(),
        candidates.map_or(registry.extensions.len(), |ids| ids.len())
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::super::MemoryExtensionStore;
    use crate::error::Error;
    use crate::store::ExtensionStore;
    use crate::types::*;

    fn creds(id: &str, scope: CredentialsScope, projects: &[&str], users: &[&str]) -> ExtensionCredentials {
        ExtensionCredentials {
            id: id.into(),
            scope,
            projects: projects.iter().map(ToString::to_string).collect(),
            users: users.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn endpoint(url: &str, endpoint_type: EndpointType) -> ExtensionEndpoint {
        ExtensionEndpoint {
            url: url.into(),
            endpoint_type,
            ..Default::default()
        }
    }

    fn run(store: &MemoryExtensionStore, query: ExtensionQuery) -> Vec<Extension> {
        store
            .query_extensions(&query, &CancellationToken::new())
            .unwrap()
    }

    fn s3_store() -> MemoryExtensionStore {
        let store = MemoryExtensionStore::new();
        store
            .register_extension(Extension {
                id: "minio".into(),
                product: "minio".into(),
                zone: "z1".into(),
                services: vec![ExtensionService {
                    id: "s3".into(),
                    resource: "s3".into(),
                    category: "object-storage".into(),
                    endpoints: vec![endpoint("http://minio.example.com", EndpointType::External)],
                    credentials: vec![
                        creds("c1", CredentialsScope::Global, &[], &[]),
                        creds("c2", CredentialsScope::Project, &["proj-a"], &[]),
                        creds("c3", CredentialsScope::User, &["proj-a"], &["alice"]),
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();
        store
    }

    fn selected(result: &[Extension]) -> Vec<String> {
        result
            .iter()
            .flat_map(|e| &e.services)
            .flat_map(|s| &s.credentials)
            .map(|c| c.id.clone())
            .collect()
    }

    #[test]
    fn test_scope_matching_selects_most_specific() {
        let store = s3_store();
        let query = |project: &str, user: &str| ExtensionQuery {
            scope_project: Some(project.into()),
            scope_user: Some(user.into()),
            ..Default::default()
        };

        assert_eq!(selected(&run(&store, query("proj-a", "alice"))), vec!["c3"]);
        assert_eq!(selected(&run(&store, query("proj-a", "bob"))), vec!["c2"]);
        assert_eq!(selected(&run(&store, query("proj-b", "bob"))), vec!["c1"]);
    }

    #[test]
    fn test_user_without_projects_outranks_project() {
        let store = s3_store();
        store
            .add_credentials("minio", "s3", creds("c4", CredentialsScope::User, &[], &["bob"]))
            .unwrap();
        let query = ExtensionQuery {
            scope_project: Some("proj-a".into()),
            scope_user: Some("bob".into()),
            ..Default::default()
        };
        assert_eq!(selected(&run(&store, query)), vec!["c4"]);
    }

    #[test]
    fn test_default_breaks_ties_then_id() {
        let store = s3_store();
        store
            .add_credentials("minio", "s3", creds("c0", CredentialsScope::Global, &[], &[]))
            .unwrap();
        assert_eq!(selected(&run(&store, ExtensionQuery::default())), vec!["c0"]);

        let mut preferred = creds("c9", CredentialsScope::Global, &[], &[]);
        preferred.is_default = true;
        store.add_credentials("minio", "s3", preferred).unwrap();
        assert_eq!(selected(&run(&store, ExtensionQuery::default())), vec!["c9"]);
    }

    #[test]
    fn test_zone_locality_of_internal_endpoints() {
        let store = MemoryExtensionStore::new();
        store
            .register_extension(Extension {
                id: "e".into(),
                zone: "z1".into(),
                services: vec![ExtensionService {
                    id: "svc".into(),
                    endpoints: vec![
                        endpoint("http://e.internal", EndpointType::Internal),
                        endpoint("https://e.example.com", EndpointType::External),
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();

        let urls = |zone: Option<&str>| -> Vec<String> {
            let query = ExtensionQuery {
                extension_id: Some("e".into()),
                zone: zone.map(Into::into),
                ..Default::default()
            };
            run(&store, query)
                .iter()
                .flat_map(|e| &e.services)
                .flat_map(|s| &s.endpoints)
                .map(|ep| ep.url.clone())
                .collect()
        };

        assert_eq!(urls(Some("z1")), vec!["http://e.internal", "https://e.example.com"]);
        assert_eq!(urls(Some("z2")), vec!["https://e.example.com"]);
        assert_eq!(urls(None), vec!["https://e.example.com"]);
    }

    #[test]
    fn test_service_with_only_ineligible_endpoints_is_dropped() {
        let store = MemoryExtensionStore::new();
        store
            .register_extension(Extension {
                id: "e".into(),
                zone: "z1".into(),
                services: vec![ExtensionService {
                    id: "svc".into(),
                    endpoints: vec![endpoint("http://e.internal", EndpointType::Internal)],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();

        let query = ExtensionQuery {
            zone: Some("z2".into()),
            ..Default::default()
        };
        assert!(run(&store, query).is_empty());
    }

    #[test]
    fn test_auth_required_service_without_credentials_is_dropped() {
        let store = MemoryExtensionStore::new();
        store
            .register_extension(Extension {
                id: "e".into(),
                services: vec![
                    ExtensionService {
                        id: "locked".into(),
                        auth_required: true,
                        credentials: vec![creds("p", CredentialsScope::Project, &["proj-a"], &[])],
                        ..Default::default()
                    },
                    ExtensionService {
                        id: "open".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            })
            .unwrap();

        let services = |project: &str| -> Vec<String> {
            let query = ExtensionQuery {
                scope_project: Some(project.into()),
                ..Default::default()
            };
            run(&store, query)
                .iter()
                .flat_map(|e| &e.services)
                .map(|s| s.id.clone())
                .collect()
        };
        assert_eq!(services("proj-a"), vec!["locked", "open"]);
        assert_eq!(services("proj-b"), vec!["open"]);
    }

    #[test]
    fn test_version_constraint_includes_prerelease_in_range() {
        let store = MemoryExtensionStore::new();
        for (id, version) in [
            ("a", "v0.9.0"),
            ("b", "v1.0.0"),
            ("c", "v1.2.3-beta"),
            ("d", ""),
            ("e", "one.two"),
        ] {
            store
                .register_extension(Extension {
                    id: id.into(),
                    version: version.into(),
                    ..Default::default()
                })
                .unwrap();
        }

        let ids = |strict: bool| -> Vec<String> {
            let query = ExtensionQuery {
                version_constraint: Some(">=1.0.0 <2.0.0".into()),
                strict_labels: strict,
                ..Default::default()
            };
            run(&store, query).into_iter().map(|e| e.id).collect()
        };
        assert_eq!(ids(false), vec!["b", "c", "d", "e"]);
        assert_eq!(ids(true), vec!["b", "c"]);
    }

    #[test]
    fn test_malformed_constraint_is_bad_request() {
        let store = s3_store();
        let query = ExtensionQuery {
            version_constraint: Some(">=banana".into()),
            ..Default::default()
        };
        let err = store
            .query_extensions(&query, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_filters_intersect_indexes() {
        let store = s3_store();
        store
            .register_extension(Extension {
                id: "mlflow".into(),
                product: "mlflow".into(),
                services: vec![ExtensionService {
                    id: "tracker".into(),
                    resource: "mlflow-tracker".into(),
                    category: "experiment-tracking".into(),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();

        let ids = |query: ExtensionQuery| -> Vec<String> {
            run(&store, query).into_iter().map(|e| e.id).collect()
        };
        assert_eq!(
            ids(ExtensionQuery {
                service_resource: Some("s3".into()),
                ..Default::default()
            }),
            vec!["minio"]
        );
        assert_eq!(
            ids(ExtensionQuery {
                product: Some("mlflow".into()),
                service_category: Some("object-storage".into()),
                ..Default::default()
            }),
            Vec::<String>::new()
        );
        assert_eq!(ids(ExtensionQuery::default()), vec!["minio", "mlflow"]);
    }

    #[test]
    fn test_endpoint_url_uses_natural_key_comparison() {
        let store = s3_store();
        let query = ExtensionQuery {
            endpoint_url: Some("HTTP://MINIO.example.com".into()),
            ..Default::default()
        };
        assert_eq!(run(&store, query).len(), 1);

        let query = ExtensionQuery {
            endpoint_url: Some("http://minio.example.com/other".into()),
            ..Default::default()
        };
        assert!(run(&store, query).is_empty());
    }

    #[test]
    fn test_cancelled_query() {
        let store = s3_store();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            store.query_extensions(&ExtensionQuery::default(), &cancel),
            Err(Error::Cancelled)
        ));
    }
}
