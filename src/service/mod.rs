//! Service facade between the transports and the stores.
//!
//! Each method validates the payload shape, binds identifiers taken from the request
//! path, and forwards to the owning store. Writes check the request's cancellation
//! token before touching a store, so a cancelled request commits nothing.

mod codeset;
mod extension;
mod runnable;
mod workflow;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{
    CodesetStore, ExtensionStore, MemoryCodesetStore, MemoryExtensionStore, MemoryProjectStore,
    MemoryRunnableStore, MemoryWorkflowStore, ProjectStore, RunnableStore, WorkflowStore,
};

/// The domain services. Stores are explicit dependencies, so independent instances
/// never share state.
#[derive(Clone)]
pub struct Services {
    extensions: Arc<dyn ExtensionStore>,
    codesets: Arc<dyn CodesetStore>,
    projects: Arc<dyn ProjectStore>,
    runnables: Arc<dyn RunnableStore>,
    workflows: Arc<dyn WorkflowStore>,
}

impl Services {
    pub fn new(
        extensions: Arc<dyn ExtensionStore>,
        codesets: Arc<dyn CodesetStore>,
        projects: Arc<dyn ProjectStore>,
        runnables: Arc<dyn RunnableStore>,
        workflows: Arc<dyn WorkflowStore>,
    ) -> Self {
        Self {
            extensions,
            codesets,
            projects,
            runnables,
            workflows,
        }
    }

    /// Services backed by fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryExtensionStore::new()),
            Arc::new(MemoryCodesetStore::new()),
            Arc::new(MemoryProjectStore::new()),
            Arc::new(MemoryRunnableStore::new()),
            Arc::new(MemoryWorkflowStore::new()),
        )
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Binds an identifier from the request path into the payload: an empty field is
/// filled, a different one is rejected.
fn bind_path(field: &mut String, path: &str, what: &str) -> Result<()> {
    if field.is_empty() {
        *field = path.to_string();
        return Ok(());
    }
    if field != path {
        return Err(Error::bad_request(format!(
            "{what} '{field}' in body does not match '{path}' in path"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_path() {
        let mut empty = String::new();
        bind_path(&mut empty, "ext-1", "id").unwrap();
        assert_eq!(empty, "ext-1");

        let mut same = "ext-1".to_string();
        assert!(bind_path(&mut same, "ext-1", "id").is_ok());

        let mut other = "ext-2".to_string();
        assert!(matches!(
            bind_path(&mut other, "ext-1", "id"),
            Err(Error::BadRequest(_))
        ));
    }
}
