use tokio_util::sync::CancellationToken;

use super::Services;
use crate::error::Result;
use crate::store::{RunnableFilter, check_cancelled};
use crate::types::Runnable;
use crate::types::validation::require;

impl Services {
    /// Registers a runnable. Any `id` or `created` in the payload is replaced.
    pub fn register_runnable(
        &self,
        runnable: Runnable,
        cancel: &CancellationToken,
    ) -> Result<Runnable> {
        require(&runnable.name, "runnable name")?;
        check_cancelled(cancel)?;
        self.runnables.register_runnable(runnable)
    }

    pub fn get_runnable(&self, name_or_id: &str) -> Result<Runnable> {
        self.runnables.get_runnable(name_or_id)
    }

    pub fn list_runnables(
        &self,
        filter: &RunnableFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Runnable>> {
        self.runnables.list_runnables(filter, cancel)
    }

    pub fn delete_runnable(&self, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        self.runnables.delete_runnable(name_or_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::RunnableImage;

    #[test]
    fn test_register_ignores_client_id() {
        let services = Services::in_memory();
        let cancel = CancellationToken::new();
        let runnable = Runnable {
            id: "client-chosen".into(),
            name: "builder".into(),
            image: RunnableImage {
                repository: "fuseml/builder".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        let created = services.register_runnable(runnable, &cancel).unwrap();
        assert_ne!(created.id, "client-chosen");
        assert_eq!(services.get_runnable(&created.id).unwrap().name, "builder");

        services.delete_runnable("builder", &cancel).unwrap();
        assert!(matches!(
            services.get_runnable(&created.id),
            Err(Error::NotFound(_))
        ));
    }
}
