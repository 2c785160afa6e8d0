use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::types::{CredentialsScope, Extension, ExtensionCredentials, ExtensionService};

/// `(extension_id, service_id)`
pub(super) type ServiceKey = (String, String);

/// Full key path of a credentials record. Ordered so that all credentials of one
/// service form a contiguous range.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(super) struct CredentialsKey {
    pub extension_id: String,
    pub service_id: String,
    pub id: String,
}

impl CredentialsKey {
    pub fn new(extension_id: &str, service_id: &str, id: &str) -> Self {
        Self {
            extension_id: extension_id.to_string(),
            service_id: service_id.to_string(),
            id: id.to_string(),
        }
    }

    pub fn of(credentials: &ExtensionCredentials) -> Self {
        Self::new(
            &credentials.extension_id,
            &credentials.service_id,
            &credentials.id,
        )
    }

    pub fn belongs_to(&self, extension_id: &str, service_id: &str) -> bool {
        self.extension_id == extension_id && self.service_id == service_id
    }
}

type ScopeCoordinate = (CredentialsScope, String);

/// Secondary indexes over the extension tree. Empty sets are pruned on removal, so a
/// registry with no extensions has an empty index.
#[derive(Debug, Default)]
pub(super) struct RegistryIndex {
    by_product: HashMap<String, BTreeSet<String>>,
    by_zone: HashMap<String, BTreeSet<String>>,
    by_resource: HashMap<String, BTreeSet<ServiceKey>>,
    by_category: HashMap<String, BTreeSet<ServiceKey>>,
    by_project: HashMap<ScopeCoordinate, BTreeSet<CredentialsKey>>,
    by_user: HashMap<ScopeCoordinate, BTreeSet<CredentialsKey>>,
}

fn add<K: Eq + Hash, V: Ord>(map: &mut HashMap<K, BTreeSet<V>>, key: K, value: V) {
    map.entry(key).or_default().insert(value);
}

fn remove<K: Eq + Hash, V: Ord>(map: &mut HashMap<K, BTreeSet<V>>, key: &K, value: &V) {
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

fn service_key(service: &ExtensionService) -> ServiceKey {
    (service.extension_id.clone(), service.id.clone())
}

impl RegistryIndex {
    pub fn insert_extension(&mut self, extension: &Extension) {
        if !extension.product.is_empty() {
            add(
                &mut self.by_product,
                extension.product.clone(),
                extension.id.clone(),
            );
        }
        if !extension.zone.is_empty() {
            add(&mut self.by_zone, extension.zone.clone(), extension.id.clone());
        }
    }

    pub fn remove_extension(&mut self, extension: &Extension) {
        remove(&mut self.by_product, &extension.product, &extension.id);
        remove(&mut self.by_zone, &extension.zone, &extension.id);
    }

    pub fn insert_service(&mut self, service: &ExtensionService) {
        if !service.resource.is_empty() {
            add(
                &mut self.by_resource,
                service.resource.clone(),
                service_key(service),
            );
        }
        if !service.category.is_empty() {
            add(
                &mut self.by_category,
                service.category.clone(),
                service_key(service),
            );
        }
    }

    pub fn remove_service(&mut self, service: &ExtensionService) {
        let key = service_key(service);
        remove(&mut self.by_resource, &service.resource, &key);
        remove(&mut self.by_category, &service.category, &key);
    }

    fn credentials_coordinates(
        credentials: &ExtensionCredentials,
    ) -> (Vec<ScopeCoordinate>, Vec<ScopeCoordinate>) {
        let scope = credentials.scope;
        let projects = match scope {
            CredentialsScope::Global => vec![(scope, String::new())],
            _ => credentials
                .projects
                .iter()
                .map(|p| (scope, p.clone()))
                .collect(),
        };
        let users = credentials
            .users
            .iter()
            .map(|u| (scope, u.clone()))
            .collect();
        (projects, users)
    }

    pub fn insert_credentials(&mut self, credentials: &ExtensionCredentials) {
        let key = CredentialsKey::of(credentials);
        let (projects, users) = Self::credentials_coordinates(credentials);
        for coordinate in projects {
            add(&mut self.by_project, coordinate, key.clone());
        }
        for coordinate in users {
            add(&mut self.by_user, coordinate, key.clone());
        }
    }

    pub fn remove_credentials(&mut self, credentials: &ExtensionCredentials) {
        let key = CredentialsKey::of(credentials);
        let (projects, users) = Self::credentials_coordinates(credentials);
        for coordinate in &projects {
            remove(&mut self.by_project, coordinate, &key);
        }
        for coordinate in &users {
            remove(&mut self.by_user, coordinate, &key);
        }
    }

    pub fn extensions_with_product(&self, product: &str) -> BTreeSet<String> {
        self.by_product.get(product).cloned().unwrap_or_default()
    }

    pub fn extensions_in_zone(&self, zone: &str) -> BTreeSet<String> {
        self.by_zone.get(zone).cloned().unwrap_or_default()
    }

    pub fn extensions_with_resource(&self, resource: &str) -> BTreeSet<String> {
        self.by_resource
            .get(resource)
            .map(|keys| keys.iter().map(|(ext, _)| ext.clone()).collect())
            .unwrap_or_default()
    }

    pub fn extensions_with_category(&self, category: &str) -> BTreeSet<String> {
        self.by_category
            .get(category)
            .map(|keys| keys.iter().map(|(ext, _)| ext.clone()).collect())
            .unwrap_or_default()
    }

    /// Credentials that can possibly match a caller in `project` acting as `user`:
    /// every global record, project records listing `project`, and user records
    /// listing `user`.
    pub fn credentials_for(
        &self,
        project: Option<&str>,
        user: Option<&str>,
    ) -> BTreeSet<CredentialsKey> {
        let mut keys = BTreeSet::new();
        let mut extend = |set: Option<&BTreeSet<CredentialsKey>>| {
            if let Some(set) = set {
                keys.extend(set.iter().cloned());
            }
        };
        extend(
            self.by_project
                .get(&(CredentialsScope::Global, String::new())),
        );
        if let Some(project) = project {
            extend(
                self.by_project
                    .get(&(CredentialsScope::Project, project.to_string())),
            );
        }
        if let Some(user) = user {
            extend(self.by_user.get(&(CredentialsScope::User, user.to_string())));
        }
        keys
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty()
            && self.by_zone.is_empty()
            && self.by_resource.is_empty()
            && self.by_category.is_empty()
            && self.by_project.is_empty()
            && self.by_user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(id: &str, scope: CredentialsScope, projects: &[&str], users: &[&str]) -> ExtensionCredentials {
        ExtensionCredentials {
            id: id.into(),
            extension_id: "ext".into(),
            service_id: "svc".into(),
            scope,
            projects: projects.iter().map(ToString::to_string).collect(),
            users: users.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_credentials_for_collects_matching_scopes() {
        let mut index = RegistryIndex::default();
        index.insert_credentials(&creds("g", CredentialsScope::Global, &[], &[]));
        index.insert_credentials(&creds("p", CredentialsScope::Project, &["proj-a"], &[]));
        index.insert_credentials(&creds("u", CredentialsScope::User, &["proj-a"], &["alice"]));

        let ids = |keys: BTreeSet<CredentialsKey>| -> Vec<String> {
            keys.into_iter().map(|k| k.id).collect()
        };
        assert_eq!(ids(index.credentials_for(None, None)), vec!["g"]);
        assert_eq!(ids(index.credentials_for(Some("proj-a"), None)), vec!["g", "p"]);
        assert_eq!(
            ids(index.credentials_for(Some("proj-a"), Some("alice"))),
            vec!["g", "p", "u"]
        );
        assert_eq!(ids(index.credentials_for(Some("proj-b"), Some("bob"))), vec!["g"]);
    }

    #[test]
    fn test_removal_prunes_empty_sets() {
        let mut index = RegistryIndex::default();
        let user = creds("u", CredentialsScope::User, &["proj-a"], &["alice"]);
        index.insert_credentials(&user);
        let service = ExtensionService {
            id: "svc".into(),
            extension_id: "ext".into(),
            resource: "s3".into(),
            category: "object-storage".into(),
            ..Default::default()
        };
        index.insert_service(&service);
        assert!(!index.is_empty());

        index.remove_credentials(&user);
        index.remove_service(&service);
        assert!(index.is_empty());
    }
}
