use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{RunnableFilter, RunnableStore, check_cancelled, read_lock, write_lock};
use crate::error::{Error, Result};
use crate::types::Runnable;
use crate::types::timestamp::now;
use crate::types::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, require, validate_configuration, validate_identifier,
    validate_max_len,
};

const STORE: &str = "runnable";

fn unique_names<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        require(name, what)?;
        if !seen.insert(name) {
            return Err(Error::bad_request(format!("duplicate {what} '{name}'")));
        }
    }
    Ok(())
}

fn validate(runnable: &Runnable) -> Result<()> {
    validate_identifier(&runnable.name, "runnable name", MAX_NAME_LEN)?;
    if !runnable.kind.is_empty() {
        validate_identifier(&runnable.kind, "runnable kind", MAX_NAME_LEN)?;
    }
    validate_max_len(&runnable.description, "description", MAX_DESCRIPTION_LEN)?;
    require(&runnable.image.repository, "image repository")?;
    unique_names(runnable.inputs.iter().map(|i| i.name.as_str()), "input name")?;
    unique_names(runnable.outputs.iter().map(|o| o.name.as_str()), "output name")?;
    validate_configuration(&runnable.labels, "labels")
}

#[derive(Debug, Default)]
struct Runnables {
    by_id: BTreeMap<String, Runnable>,
    /// name → id
    names: HashMap<String, String>,
}

impl Runnables {
    fn find(&self, name_or_id: &str) -> Option<&Runnable> {
        self.by_id.get(name_or_id).or_else(|| {
            self.names
                .get(name_or_id)
                .and_then(|id| self.by_id.get(id))
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunnableStore {
    runnables: RwLock<Runnables>,
}

impl MemoryRunnableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(runnable: &Runnable, filter: &RunnableFilter) -> bool {
    let given = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
    if given(&filter.id).is_some_and(|id| runnable.id != id) {
        return false;
    }
    if given(&filter.name).is_some_and(|name| runnable.name != name) {
        return false;
    }
    if given(&filter.kind).is_some_and(|kind| runnable.kind != kind) {
        return false;
    }
    filter
        .labels
        .iter()
        .all(|(key, value)| runnable.labels.get(key) == Some(value))
}

impl RunnableStore for MemoryRunnableStore {
    fn register_runnable(&self, mut runnable: Runnable) -> Result<Runnable> {
        validate(&runnable)?;

        let mut guard = write_lock(&self.runnables, STORE);
        let runnables = &mut *guard;
        if runnables.names.contains_key(&runnable.name) {
            return Err(Error::conflict(format!(
                "runnable '{}' already exists",
                runnable.name
            )));
        }

        runnable.id = Uuid::new_v4().to_string();
        runnable.created = Some(now());
        runnables
            .names
            .insert(runnable.name.clone(), runnable.id.clone());
        runnables.by_id.insert(runnable.id.clone(), runnable.clone());

        info!("Registered runnable {} ({})", runnable.name, runnable.id);
        Ok(runnable)
    }

    fn get_runnable(&self, name_or_id: &str) -> Result<Runnable> {
        let runnables = read_lock(&self.runnables, STORE);
        runnables
            .find(name_or_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("runnable '{name_or_id}' not found")))
    }

    fn list_runnables(
        &self,
        filter: &RunnableFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Runnable>> {
        let runnables = read_lock(&self.runnables, STORE);
        let mut result = Vec::new();
        for runnable in runnables.by_id.values() {
            check_cancelled(cancel)?;
            if matches(runnable, filter) {
                result.push(runnable.clone());
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn delete_runnable(&self, name_or_id: &str) -> Result<()> {
        let mut guard = write_lock(&self.runnables, STORE);
        let runnables = &mut *guard;
        let id = runnables
            .find(name_or_id)
            .map(|r| r.id.clone())
            .ok_or_else(|| Error::not_found(format!("runnable '{name_or_id}' not found")))?;
        if let Some(runnable) = runnables.by_id.remove(&id) {
            runnables.names.remove(&runnable.name);
            info!("Deleted runnable {} ({id})", runnable.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunnableImage, RunnableInput};

    fn runnable(name: &str, kind: &str) -> Runnable {
        Runnable {
            name: name.into(),
            kind: kind.into(),
            image: RunnableImage {
                repository: format!("fuseml/{name}"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_register_assigns_id_and_created() {
        let store = MemoryRunnableStore::new();
        let created = store.register_runnable(runnable("builder", "builder")).unwrap();

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert!(created.created.is_some());
        assert_eq!(store.get_runnable("builder").unwrap(), created);
        assert_eq!(store.get_runnable(&created.id).unwrap(), created);
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let store = MemoryRunnableStore::new();
        store.register_runnable(runnable("builder", "builder")).unwrap();
        assert!(matches!(
            store.register_runnable(runnable("builder", "trainer")),
            Err(Error::Conflict(_))
        ));
        assert_eq!(store.get_runnable("builder").unwrap().kind, "builder");
    }

    #[test]
    fn test_validation() {
        let store = MemoryRunnableStore::new();

        let mut no_image = runnable("builder", "builder");
        no_image.image.repository.clear();
        assert!(matches!(
            store.register_runnable(no_image),
            Err(Error::BadRequest(_))
        ));

        let mut duplicate_inputs = runnable("trainer", "trainer");
        duplicate_inputs.inputs = vec![
            RunnableInput {
                name: "data".into(),
                ..Default::default()
            },
            RunnableInput {
                name: "data".into(),
                ..Default::default()
            },
        ];
        assert!(matches!(
            store.register_runnable(duplicate_inputs),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_list_filters() {
        let store = MemoryRunnableStore::new();
        let builder = store.register_runnable(runnable("builder", "builder")).unwrap();
        let mut trainer = runnable("trainer", "trainer");
        trainer.labels.insert("framework".into(), "mlflow".into());
        store.register_runnable(trainer).unwrap();
        store.register_runnable(runnable("predictor", "predictor")).unwrap();

        let cancel = CancellationToken::new();
        let names = |filter: RunnableFilter| -> Vec<String> {
            store
                .list_runnables(&filter, &cancel)
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect()
        };

        assert_eq!(
            names(RunnableFilter::default()),
            vec!["builder", "predictor", "trainer"]
        );
        assert_eq!(
            names(RunnableFilter {
                id: Some(builder.id.clone()),
                ..Default::default()
            }),
            vec!["builder"]
        );
        assert_eq!(
            names(RunnableFilter {
                kind: Some("trainer".into()),
                ..Default::default()
            }),
            vec!["trainer"]
        );

        let mut labels = BTreeMap::new();
        labels.insert("framework".to_string(), "mlflow".to_string());
        assert_eq!(
            names(RunnableFilter {
                labels,
                ..Default::default()
            }),
            vec!["trainer"]
        );
    }

    #[test]
    fn test_delete_by_name_frees_the_name() {
        let store = MemoryRunnableStore::new();
        store.register_runnable(runnable("builder", "builder")).unwrap();
        store.delete_runnable("builder").unwrap();

        assert!(matches!(
            store.get_runnable("builder"),
            Err(Error::NotFound(_))
        ));
        assert!(store.register_runnable(runnable("builder", "builder")).is_ok());
    }
}
