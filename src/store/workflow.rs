use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{WorkflowFilter, WorkflowStore, check_cancelled, read_lock, write_lock};
use crate::error::{Error, Result};
use crate::types::timestamp::now;
use crate::types::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, require, validate_identifier, validate_max_len,
};
use crate::types::{DEFAULT_CODESET_PATH, Workflow, WorkflowStep};

const STORE: &str = "workflow";

/// Extracts the trimmed contents of every `{{ ... }}` placeholder in `text`.
fn placeholders(text: &str) -> Result<Vec<&str>> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| Error::bad_request(format!("unterminated placeholder in '{text}'")))?;
        found.push(after[..end].trim());
        rest = &after[end + 2..];
    }
    Ok(found)
}

/// What earlier parts of the workflow make available to a step.
struct Scope<'w> {
    inputs: BTreeSet<&'w str>,
    step_outputs: BTreeMap<&'w str, BTreeSet<&'w str>>,
}

impl Scope<'_> {
    fn check(&self, text: &str, step: &str) -> Result<()> {
        for reference in placeholders(text)? {
            let parts: Vec<&str> = reference.split('.').collect();
            let known = match parts.as_slice() {
                ["inputs", name] => self.inputs.contains(name),
                ["steps", producer, "outputs", output] => self
                    .step_outputs
                    .get(producer)
                    .is_some_and(|outputs| outputs.contains(output)),
                _ => {
                    return Err(Error::bad_request(format!(
                        "step '{step}': unsupported reference '{{{{ {reference} }}}}'"
                    )));
                }
            };
            if !known {
                return Err(Error::bad_request(format!(
                    "step '{step}': reference '{{{{ {reference} }}}}' does not name a workflow \
                     input or an output of an earlier step"
                )));
            }
        }
        Ok(())
    }
}

fn unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<BTreeSet<&'a str>> {
    let mut seen = BTreeSet::new();
    for name in names {
        require(name, what)?;
        if !seen.insert(name) {
            return Err(Error::bad_request(format!("duplicate {what} '{name}'")));
        }
    }
    Ok(seen)
}

fn prepare_step(step: &mut WorkflowStep) -> Result<()> {
    validate_identifier(&step.name, "step name", MAX_NAME_LEN)?;
    require(&step.image, "step image")?;
    for input in &mut step.inputs {
        require(&input.name, "step input name")?;
        match (&input.value, &mut input.codeset) {
            (Some(_), None) => {}
            (None, Some(codeset)) => {
                require(&codeset.name, "step input codeset name")?;
                if codeset.path.trim().is_empty() {
                    codeset.path = DEFAULT_CODESET_PATH.to_string();
                }
            }
            _ => {
                return Err(Error::bad_request(format!(
                    "step '{}': input '{}' must set exactly one of value or codeset",
                    step.name, input.name
                )));
            }
        }
    }
    for env in &step.env {
        require(&env.name, "step env name")?;
    }
    Ok(())
}

/// Validates `workflow`, filling default codeset mount paths.
fn prepare(workflow: &mut Workflow) -> Result<()> {
    validate_identifier(&workflow.name, "workflow name", MAX_NAME_LEN)?;
    validate_max_len(&workflow.description, "description", MAX_DESCRIPTION_LEN)?;
    if workflow.steps.is_empty() {
        return Err(Error::bad_request("workflow must have at least one step"));
    }
    for step in &mut workflow.steps {
        prepare_step(step)?;
    }

    let mut scope = Scope {
        inputs: unique(workflow.inputs.iter().map(|i| i.name.as_str()), "workflow input")?,
        step_outputs: BTreeMap::new(),
    };
    unique(workflow.outputs.iter().map(|o| o.name.as_str()), "workflow output")?;
    unique(workflow.steps.iter().map(|s| s.name.as_str()), "step name")?;

    for step in &workflow.steps {
        unique(step.inputs.iter().map(|i| i.name.as_str()), "step input")?;
        scope.check(&step.image, &step.name)?;
        for input in &step.inputs {
            let source = match (&input.value, &input.codeset) {
                (Some(value), _) => value.as_str(),
                (None, Some(codeset)) => codeset.name.as_str(),
                (None, None) => continue,
            };
            scope.check(source, &step.name)?;
        }
        for env in &step.env {
            scope.check(&env.value, &step.name)?;
        }
        let outputs = unique(step.outputs.iter().map(|o| o.name.as_str()), "step output")?;
        scope.step_outputs.insert(step.name.as_str(), outputs);
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Workflows {
    by_id: BTreeMap<String, Workflow>,
    /// name → id
    names: HashMap<String, String>,
}

impl Workflows {
    fn find(&self, name_or_id: &str) -> Option<&Workflow> {
        self.by_id.get(name_or_id).or_else(|| {
            self.names
                .get(name_or_id)
                .and_then(|id| self.by_id.get(id))
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<Workflows>,
}

impl MemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn register_workflow(&self, mut workflow: Workflow) -> Result<Workflow> {
        prepare(&mut workflow)?;

        let mut guard = write_lock(&self.workflows, STORE);
        let workflows = &mut *guard;
        if workflows.names.contains_key(&workflow.name) {
            return Err(Error::conflict(format!(
                "workflow '{}' already exists",
                workflow.name
            )));
        }

        workflow.id = Uuid::new_v4().to_string();
        workflow.created = Some(now());
        workflows
            .names
            .insert(workflow.name.clone(), workflow.id.clone());
        workflows.by_id.insert(workflow.id.clone(), workflow.clone());

        info!(
            "Registered workflow {} ({}, {} steps)",
            workflow.name,
            workflow.id,
            workflow.steps.len()
        );
        Ok(workflow)
    }

    fn get_workflow(&self, name_or_id: &str) -> Result<Workflow> {
        let workflows = read_lock(&self.workflows, STORE);
        workflows
            .find(name_or_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("workflow '{name_or_id}' not found")))
    }

    fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<Workflow>> {
        let name = filter.name.as_deref().filter(|n| !n.is_empty());
        let workflows = read_lock(&self.workflows, STORE);
        let mut result = Vec::new();
        for workflow in workflows.by_id.values() {
            check_cancelled(cancel)?;
            if name.is_none_or(|n| workflow.name == n) {
                result.push(workflow.clone());
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn delete_workflow(&self, name_or_id: &str) -> Result<()> {
        let mut guard = write_lock(&self.workflows, STORE);
        let workflows = &mut *guard;
        let id = workflows
            .find(name_or_id)
            .map(|w| w.id.clone())
            .ok_or_else(|| Error::not_found(format!("workflow '{name_or_id}' not found")))?;
        if let Some(workflow) = workflows.by_id.remove(&id) {
            workflows.names.remove(&workflow.name);
            info!("Deleted workflow {} ({id})", workflow.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        StepEnv, StepInput, StepInputCodeset, StepOutput, StepOutputImage, WorkflowInput,
    };

    fn mlflow_workflow() -> Workflow {
        Workflow {
            name: "mlflow-sklearn-e2e".into(),
            inputs: vec![
                WorkflowInput {
                    name: "mlflow-codeset".into(),
                    input_type: "codeset".into(),
                    ..Default::default()
                },
                WorkflowInput {
                    name: "predictor".into(),
                    default: Some("auto".into()),
                    ..Default::default()
                },
            ],
            steps: vec![
                WorkflowStep {
                    name: "builder".into(),
                    image: "ghcr.io/fuseml/mlflow-builder:1.0".into(),
                    inputs: vec![StepInput {
                        name: "mlflow-codeset".into(),
                        codeset: Some(StepInputCodeset {
                            name: "{{ inputs.mlflow-codeset }}".into(),
                            path: String::new(),
                        }),
                        ..Default::default()
                    }],
                    outputs: vec![StepOutput {
                        name: "mlflow-env".into(),
                        image: Some(StepOutputImage {
                            dockerfile: ".fuseml/Dockerfile".into(),
                            name: "registry.fuseml/mlflow-env".into(),
                        }),
                    }],
                    ..Default::default()
                },
                WorkflowStep {
                    name: "trainer".into(),
                    image: "{{ steps.builder.outputs.mlflow-env }}".into(),
                    env: vec![StepEnv {
                        name: "PREDICTOR".into(),
                        value: "{{ inputs.predictor }}".into(),
                    }],
                    inputs: vec![StepInput {
                        name: "model".into(),
                        value: Some("{{ steps.builder.outputs.mlflow-env }}".into()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_register_fills_defaults() {
        let store = MemoryWorkflowStore::new();
        let workflow = store.register_workflow(mlflow_workflow()).unwrap();

        assert!(!workflow.id.is_empty());
        assert!(workflow.created.is_some());
        let codeset = workflow.steps[0].inputs[0].codeset.as_ref().unwrap();
        assert_eq!(codeset.path, DEFAULT_CODESET_PATH);

        assert_eq!(store.get_workflow("mlflow-sklearn-e2e").unwrap(), workflow);
        assert_eq!(store.get_workflow(&workflow.id).unwrap(), workflow);
    }

    #[test]
    fn test_duplicate_name_conflicts() {
        let store = MemoryWorkflowStore::new();
        store.register_workflow(mlflow_workflow()).unwrap();
        assert!(matches!(
            store.register_workflow(mlflow_workflow()),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_reference_to_later_step_is_rejected() {
        let mut workflow = mlflow_workflow();
        workflow.steps.swap(0, 1);
        let err = prepare(&mut workflow).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_reference_to_undeclared_input_is_rejected() {
        let mut workflow = mlflow_workflow();
        workflow.steps[1].env[0].value = "{{ inputs.missing }}".into();
        assert!(prepare(&mut workflow).is_err());
    }

    #[test]
    fn test_step_input_needs_exactly_one_source() {
        let mut workflow = mlflow_workflow();
        workflow.steps[1].inputs[0].codeset = Some(StepInputCodeset {
            name: "cs".into(),
            path: String::new(),
        });
        assert!(prepare(&mut workflow).is_err());

        workflow.steps[1].inputs[0] = StepInput {
            name: "model".into(),
            ..Default::default()
        };
        assert!(prepare(&mut workflow).is_err());
    }

    #[test]
    fn test_duplicate_step_names_are_rejected() {
        let mut workflow = mlflow_workflow();
        workflow.steps[1].name = "builder".into();
        assert!(prepare(&mut workflow).is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("a {{ inputs.x }} b {{steps.s.outputs.o}}").unwrap(),
            vec!["inputs.x", "steps.s.outputs.o"]
        );
        assert!(placeholders("{{ inputs.x").is_err());
        assert!(placeholders("plain").unwrap().is_empty());
    }

    #[test]
    fn test_list_by_name_and_delete() {
        let store = MemoryWorkflowStore::new();
        let workflow = store.register_workflow(mlflow_workflow()).unwrap();
        let cancel = CancellationToken::new();

        let filter = WorkflowFilter {
            name: Some("mlflow-sklearn-e2e".into()),
        };
        assert_eq!(store.list_workflows(&filter, &cancel).unwrap().len(), 1);
        let filter = WorkflowFilter {
            name: Some("other".into()),
        };
        assert!(store.list_workflows(&filter, &cancel).unwrap().is_empty());

        store.delete_workflow(&workflow.id).unwrap();
        assert!(matches!(
            store.get_workflow("mlflow-sklearn-e2e"),
            Err(Error::NotFound(_))
        ));
    }
}
