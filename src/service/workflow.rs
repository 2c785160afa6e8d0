use tokio_util::sync::CancellationToken;

use super::Services;
use crate::error::Result;
use crate::store::{WorkflowFilter, check_cancelled};
use crate::types::Workflow;
use crate::types::validation::require;

impl Services {
    pub fn register_workflow(
        &self,
        workflow: Workflow,
        cancel: &CancellationToken,
    ) -> Result<Workflow> {
        require(&workflow.name, "workflow name")?;
        check_cancelled(cancel)?;
        self.workflows.register_workflow(workflow)
    }

    pub fn get_workflow(&self, name_or_id: &str) -> Result<Workflow> {
        self.workflows.get_workflow(name_or_id)
    }

    pub fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Workflow>> {
        self.workflows.list_workflows(filter, cancel)
    }

    pub fn delete_workflow(&self, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        self.workflows.delete_workflow(name_or_id)
    }
}
