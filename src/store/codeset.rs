use std::collections::BTreeMap;
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CodesetFilter, CodesetStore, check_cancelled, read_lock, write_lock};
use crate::error::{Error, Result};
use crate::types::Codeset;
use crate::types::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, parse_uri, validate_identifier, validate_max_len,
};

const STORE: &str = "codeset";

/// `(project, name)`
type CodesetKey = (String, String);

fn validate(codeset: &Codeset) -> Result<()> {
    validate_identifier(&codeset.name, "codeset name", MAX_NAME_LEN)?;
    validate_identifier(&codeset.project, "codeset project", MAX_NAME_LEN)?;
    validate_max_len(&codeset.description, "description", MAX_DESCRIPTION_LEN)?;
    if !codeset.url.trim().is_empty() {
        parse_uri(&codeset.url, "codeset url")?;
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryCodesetStore {
    codesets: RwLock<BTreeMap<CodesetKey, Codeset>>,
}

impl MemoryCodesetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodesetStore for MemoryCodesetStore {
    fn register_codeset(&self, codeset: Codeset) -> Result<Codeset> {
        validate(&codeset)?;
        let key = (codeset.project.clone(), codeset.name.clone());

        let mut codesets = write_lock(&self.codesets, STORE);
        if codesets.contains_key(&key) {
            return Err(Error::conflict(format!(
                "codeset '{}' already exists in project '{}'",
                codeset.name, codeset.project
            )));
        }
        codesets.insert(key, codeset.clone());

        info!("Registered codeset {}/{}", codeset.project, codeset.name);
        Ok(codeset)
    }

    fn get_codeset(&self, project: &str, name: &str) -> Result<Codeset> {
        let codesets = read_lock(&self.codesets, STORE);
        codesets
            .get(&(project.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!(
                    "codeset '{name}' not found in project '{project}'"
                ))
            })
    }

    fn list_codesets(
        &self,
        filter: &CodesetFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Codeset>> {
        let project = filter.project.as_deref().filter(|p| !p.is_empty());
        let label = filter.label.as_deref().filter(|l| !l.is_empty());

        let codesets = read_lock(&self.codesets, STORE);
        let mut result = Vec::new();
        for codeset in codesets.values() {
            check_cancelled(cancel)?;
            if project.is_some_and(|p| codeset.project != p) {
                continue;
            }
            if label.is_some_and(|l| !codeset.labels.iter().any(|x| x == l)) {
                continue;
            }
            result.push(codeset.clone());
        }
        Ok(result)
    }

    fn delete_codeset(&self, project: &str, name: &str) -> Result<()> {
        let mut codesets = write_lock(&self.codesets, STORE);
        codesets
            .remove(&(project.to_string(), name.to_string()))
            .ok_or_else(|| {
                Error::not_found(format!(
                    "codeset '{name}' not found in project '{project}'"
                ))
            })?;

        info!("Deleted codeset {project}/{name}");
        Ok(())
    }

    fn delete_project_codesets(&self, project: &str) -> Result<usize> {
        let mut codesets = write_lock(&self.codesets, STORE);
        let before = codesets.len();
        codesets.retain(|(owner, _), _| owner != project);
        let removed = before - codesets.len();

        debug!("Deleted {removed} codesets of project {project}");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codeset(project: &str, name: &str, labels: &[&str]) -> Codeset {
        Codeset {
            name: name.into(),
            project: project.into(),
            labels: labels.iter().map(ToString::to_string).collect(),
            url: format!("http://gitea.example.com/{project}/{name}.git"),
            ..Default::default()
        }
    }

    fn names(codesets: Vec<Codeset>) -> Vec<String> {
        codesets.into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_list_filters_by_project_and_label() {
        let store = MemoryCodesetStore::new();
        store.register_codeset(codeset("proj-a", "cs1", &["mlflow"])).unwrap();
        store.register_codeset(codeset("proj-a", "cs2", &["sklearn"])).unwrap();
        store.register_codeset(codeset("proj-b", "cs3", &["mlflow"])).unwrap();

        let cancel = CancellationToken::new();
        let list = |project: Option<&str>, label: Option<&str>| {
            let filter = CodesetFilter {
                project: project.map(Into::into),
                label: label.map(Into::into),
            };
            names(store.list_codesets(&filter, &cancel).unwrap())
        };

        assert_eq!(list(Some("proj-a"), Some("mlflow")), vec!["cs1"]);
        assert_eq!(list(Some("proj-a"), None), vec!["cs1", "cs2"]);
        assert_eq!(list(None, Some("mlflow")), vec!["cs1", "cs3"]);
        assert_eq!(list(None, None).len(), 3);
    }

    #[test]
    fn test_duplicate_conflicts_and_keeps_original() {
        let store = MemoryCodesetStore::new();
        store.register_codeset(codeset("proj-a", "cs1", &["mlflow"])).unwrap();

        let err = store
            .register_codeset(codeset("proj-a", "cs1", &["other"]))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(
            store.get_codeset("proj-a", "cs1").unwrap().labels,
            vec!["mlflow"]
        );

        // same name in another project is a different codeset
        assert!(store.register_codeset(codeset("proj-b", "cs1", &[])).is_ok());
    }

    #[test]
    fn test_register_validates_fields() {
        let store = MemoryCodesetStore::new();
        assert!(matches!(
            store.register_codeset(codeset("proj a", "cs1", &[])),
            Err(Error::BadRequest(_))
        ));
        let mut bad_url = codeset("proj-a", "cs1", &[]);
        bad_url.url = "not a url".into();
        assert!(matches!(
            store.register_codeset(bad_url),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_delete_and_project_cascade() {
        let store = MemoryCodesetStore::new();
        store.register_codeset(codeset("proj-a", "cs1", &[])).unwrap();
        store.register_codeset(codeset("proj-a", "cs2", &[])).unwrap();
        store.register_codeset(codeset("proj-b", "cs3", &[])).unwrap();

        store.delete_codeset("proj-a", "cs1").unwrap();
        assert!(matches!(
            store.delete_codeset("proj-a", "cs1"),
            Err(Error::NotFound(_))
        ));

        assert_eq!(store.delete_project_codesets("proj-a").unwrap(), 1);
        let remaining = store
            .list_codesets(&CodesetFilter::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(names(remaining), vec!["cs3"]);
    }
}
