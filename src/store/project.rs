use std::collections::BTreeMap;
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ProjectStore, check_cancelled, read_lock, write_lock};
use crate::error::{Error, Result};
use crate::types::Project;
use crate::types::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, require, validate_identifier, validate_max_len,
};

const STORE: &str = "project";

fn validate(project: &Project) -> Result<()> {
    validate_identifier(&project.name, "project name", MAX_NAME_LEN)?;
    validate_max_len(&project.description, "description", MAX_DESCRIPTION_LEN)?;
    for user in &project.users {
        require(&user.name, "project user name")?;
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<BTreeMap<String, Project>>,
}

impl MemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn register_project(&self, project: Project) -> Result<Project> {
        validate(&project)?;

        let mut projects = write_lock(&self.projects, STORE);
        if projects.contains_key(&project.name) {
            return Err(Error::conflict(format!(
                "project '{}' already exists",
                project.name
            )));
        }
        projects.insert(project.name.clone(), project.clone());

        info!("Registered project {}", project.name);
        Ok(project)
    }

    fn ensure_project(&self, name: &str) -> Result<Project> {
        let project = Project {
            name: name.to_string(),
            ..Default::default()
        };
        validate(&project)?;

        let mut projects = write_lock(&self.projects, STORE);
        let project = projects.entry(project.name.clone()).or_insert_with(|| {
            info!("Registered project {name} implicitly");
            project
        });
        Ok(project.clone())
    }

    fn get_project(&self, name: &str) -> Result<Project> {
        let projects = read_lock(&self.projects, STORE);
        projects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("project '{name}' not found")))
    }

    fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        let projects = read_lock(&self.projects, STORE);
        let mut result = Vec::with_capacity(projects.len());
        for project in projects.values() {
            check_cancelled(cancel)?;
            result.push(project.clone());
        }
        Ok(result)
    }

    fn delete_project(&self, name: &str) -> Result<()> {
        let mut projects = write_lock(&self.projects, STORE);
        projects
            .remove(name)
            .ok_or_else(|| Error::not_found(format!("project '{name}' not found")))?;

        info!("Deleted project {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProjectUser;

    #[test]
    fn test_register_get_delete() {
        let store = MemoryProjectStore::new();
        let project = Project {
            name: "proj-a".into(),
            description: "team a".into(),
            users: vec![ProjectUser {
                name: "alice".into(),
                email: "alice@example.com".into(),
            }],
        };
        store.register_project(project.clone()).unwrap();
        assert_eq!(store.get_project("proj-a").unwrap(), project);

        assert!(matches!(
            store.register_project(project),
            Err(Error::Conflict(_))
        ));

        store.delete_project("proj-a").unwrap();
        assert!(matches!(store.get_project("proj-a"), Err(Error::NotFound(_))));
        assert!(matches!(
            store.delete_project("proj-a"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_ensure_project_keeps_existing() {
        let store = MemoryProjectStore::new();
        store
            .register_project(Project {
                name: "proj-a".into(),
                description: "kept".into(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.ensure_project("proj-a").unwrap().description, "kept");
        assert_eq!(store.ensure_project("proj-b").unwrap().name, "proj-b");
        assert!(store.ensure_project("bad name").is_err());

        let names: Vec<String> = store
            .list_projects(&CancellationToken::new())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["proj-a", "proj-b"]);
    }
}
