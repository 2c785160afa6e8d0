use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Services;
use crate::error::Result;
use crate::store::{CodesetFilter, check_cancelled};
use crate::types::validation::require;
use crate::types::{Codeset, Project};

impl Services {
    /// Registers a codeset, implicitly registering its project when it does not exist.
    pub fn register_codeset(&self, codeset: Codeset, cancel: &CancellationToken) -> Result<Codeset> {
        require(&codeset.name, "codeset name")?;
        require(&codeset.project, "codeset project")?;
        check_cancelled(cancel)?;
        let codeset = self.codesets.register_codeset(codeset)?;
        self.projects.ensure_project(&codeset.project)?;
        Ok(codeset)
    }

    pub fn get_codeset(&self, project: &str, name: &str) -> Result<Codeset> {
        self.codesets.get_codeset(project, name)
    }

    pub fn list_codesets(
        &self,
        filter: &CodesetFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Codeset>> {
        self.codesets.list_codesets(filter, cancel)
    }

    pub fn delete_codeset(&self, project: &str, name: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        self.codesets.delete_codeset(project, name)
    }

    /// Registers a project with its users. Library-only: the HTTP API creates projects
    /// implicitly through codeset registration.
    pub fn register_project(&self, project: Project, cancel: &CancellationToken) -> Result<Project> {
        require(&project.name, "project name")?;
        check_cancelled(cancel)?;
        self.projects.register_project(project)
    }

    pub fn get_project(&self, name: &str) -> Result<Project> {
        self.projects.get_project(name)
    }

    pub fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        self.projects.list_projects(cancel)
    }

    /// Deletes a project and every codeset registered under it.
    pub fn delete_project(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        self.projects.delete_project(name)?;
        let removed = self.codesets.delete_project_codesets(name)?;
        if removed > 0 {
            info!("Deleted {removed} codesets with project {name}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::ProjectUser;

    fn codeset(project: &str, name: &str) -> Codeset {
        Codeset {
            name: name.into(),
            project: project.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_codeset_registers_project() {
        let services = Services::in_memory();
        let cancel = CancellationToken::new();

        services.register_codeset(codeset("proj-a", "cs1"), &cancel).unwrap();
        assert_eq!(services.get_project("proj-a").unwrap().name, "proj-a");

        // a second codeset reuses the existing project
        services.register_codeset(codeset("proj-a", "cs2"), &cancel).unwrap();
        assert_eq!(services.list_projects(&cancel).unwrap().len(), 1);
    }

    #[test]
    fn test_registered_project_keeps_users() {
        let services = Services::in_memory();
        let cancel = CancellationToken::new();
        let project = Project {
            name: "proj-a".into(),
            users: vec![ProjectUser {
                name: "alice".into(),
                email: "alice@example.com".into(),
            }],
            ..Default::default()
        };
        services.register_project(project.clone(), &cancel).unwrap();
        assert!(matches!(
            services.register_project(project, &cancel),
            Err(Error::Conflict(_))
        ));

        services.register_codeset(codeset("proj-a", "cs1"), &cancel).unwrap();
        let fetched = services.get_project("proj-a").unwrap();
        assert_eq!(fetched.users[0].name, "alice");
    }

    #[test]
    fn test_missing_fields_are_bad_request() {
        let services = Services::in_memory();
        let cancel = CancellationToken::new();
        assert!(matches!(
            services.register_codeset(codeset("", "cs1"), &cancel),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            services.register_codeset(codeset("proj-a", ""), &cancel),
            Err(Error::BadRequest(_))
        ));
        assert!(services.list_projects(&cancel).unwrap().is_empty());
    }

    #[test]
    fn test_project_delete_cascades_to_codesets() {
        let services = Services::in_memory();
        let cancel = CancellationToken::new();
        services.register_codeset(codeset("proj-a", "cs1"), &cancel).unwrap();
        services.register_codeset(codeset("proj-b", "cs2"), &cancel).unwrap();

        services.delete_project("proj-a", &cancel).unwrap();

        assert!(matches!(
            services.get_codeset("proj-a", "cs1"),
            Err(Error::NotFound(_))
        ));
        assert!(services.get_codeset("proj-b", "cs2").is_ok());
        assert!(matches!(
            services.delete_project("proj-a", &cancel),
            Err(Error::NotFound(_))
        ));
    }
}
