use super::Context;
use super::commands::{RunnableCommands, WorkflowCommands};
use super::http_client::segment;
use super::output::load_payload;
use crate::types::{Runnable, Workflow};

fn runnable_query(
    id: Option<String>,
    name: Option<String>,
    kind: Option<String>,
    labels: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = [("id", id), ("name", name), ("kind", kind)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();
    pairs.extend(labels);
    pairs
}

pub fn run_runnable(ctx: &Context, command: RunnableCommands) -> anyhow::Result<()> {
    let client = &ctx.client;
    match command {
        RunnableCommands::Register {
            file,
            name,
            kind,
            description,
            image,
            inputs,
            outputs,
            labels,
        } => {
            let mut runnable: Runnable = load_payload(file.as_deref())?;
            if let Some(name) = name {
                runnable.name = name;
            }
            if let Some(kind) = kind {
                runnable.kind = kind;
            }
            if let Some(description) = description {
                runnable.description = description;
            }
            if let Some(image) = image {
                runnable.image = image.into_inner();
            }
            if let Some(inputs) = inputs {
                runnable.inputs = inputs.into_inner();
            }
            if let Some(outputs) = outputs {
                runnable.outputs = outputs.into_inner();
            }
            if let Some(labels) = labels {
                runnable.labels = labels.into_inner();
            }
            let created: Runnable = client.post("/runnables", &runnable)?;
            ctx.print(&created)
        }
        RunnableCommands::List {
            id,
            name,
            kind,
            labels,
        } => {
            let query = runnable_query(id, name, kind, labels);
            let runnables: Vec<Runnable> = client.get_with_query("/runnables", &query)?;
            ctx.print(&runnables)
        }
        RunnableCommands::Get { name } => {
            let runnable: Runnable = client.get(&format!("/runnables/{}", segment(&name)))?;
            ctx.print(&runnable)
        }
    }
}

pub fn run_workflow(ctx: &Context, command: WorkflowCommands) -> anyhow::Result<()> {
    let client = &ctx.client;
    match command {
        WorkflowCommands::Register {
            file,
            name,
            description,
            inputs,
            outputs,
            steps,
        } => {
            let mut workflow: Workflow = load_payload(file.as_deref())?;
            if let Some(name) = name {
                workflow.name = name;
            }
            if let Some(description) = description {
                workflow.description = description;
            }
            if let Some(inputs) = inputs {
                workflow.inputs = inputs.into_inner();
            }
            if let Some(outputs) = outputs {
                workflow.outputs = outputs.into_inner();
            }
            if let Some(steps) = steps {
                workflow.steps = steps.into_inner();
            }
            let created: Workflow = client.post("/workflows", &workflow)?;
            ctx.print(&created)
        }
        WorkflowCommands::List { name } => {
            let query: Vec<(&str, String)> = name.into_iter().map(|n| ("name", n)).collect();
            let workflows: Vec<Workflow> = client.get_with_query("/workflows", &query)?;
            ctx.print(&workflows)
        }
        WorkflowCommands::Get { name } => {
            let workflow: Workflow = client.get(&format!("/workflows/{}", segment(&name)))?;
            ctx.print(&workflow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runnable_query_pairs() {
        let pairs = runnable_query(
            None,
            Some("builder".into()),
            None,
            vec![("tier".into(), "gold".into())],
        );
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "builder".to_string()),
                ("tier".to_string(), "gold".to_string()),
            ]
        );
    }
}
