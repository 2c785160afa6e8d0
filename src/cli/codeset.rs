use super::Context;
use super::commands::{CodesetCommands, ProjectCommands};
use super::http_client::segment;
use super::output::load_payload;
use crate::store::CodesetFilter;
use crate::types::{Codeset, Project};

fn filter_pairs(filter: &CodesetFilter) -> Vec<(&'static str, &str)> {
    let mut pairs = Vec::new();
    if let Some(project) = &filter.project {
        pairs.push(("project", project.as_str()));
    }
    if let Some(label) = &filter.label {
        pairs.push(("label", label.as_str()));
    }
    pairs
}

pub fn run_codeset(ctx: &Context, command: CodesetCommands) -> anyhow::Result<()> {
    let client = &ctx.client;
    match command {
        CodesetCommands::Register {
            file,
            name,
            project,
            description,
            labels,
            repo_url,
        } => {
            let mut codeset: Codeset = load_payload(file.as_deref())?;
            if let Some(name) = name {
                codeset.name = name;
            }
            if let Some(project) = project {
                codeset.project = project;
            }
            if let Some(description) = description {
                codeset.description = description;
            }
            if let Some(labels) = labels {
                codeset.labels = labels.into_inner();
            }
            if let Some(url) = repo_url {
                codeset.url = url;
            }
            let created: Codeset = client.post("/codesets", &codeset)?;
            ctx.print(&created)
        }
        CodesetCommands::List { project, label } => {
            let filter = CodesetFilter { project, label };
            let codesets: Vec<Codeset> = client.get_with_query("/codesets", &filter_pairs(&filter))?;
            ctx.print(&codesets)
        }
        CodesetCommands::Get { project, name } => {
            let codeset: Codeset = client.get(&format!(
                "/codesets/{}/{}",
                segment(&project),
                segment(&name)
            ))?;
            ctx.print(&codeset)
        }
        CodesetCommands::Delete { project, name } => {
            client.delete(&format!(
                "/codesets/{}/{}",
                segment(&project),
                segment(&name)
            ))?;
            eprintln!("Deleted codeset '{project}/{name}'");
            Ok(())
        }
    }
}

pub fn run_project(ctx: &Context, command: ProjectCommands) -> anyhow::Result<()> {
    let client = &ctx.client;
    match command {
        ProjectCommands::List => {
            let projects: Vec<Project> = client.get("/projects")?;
            ctx.print(&projects)
        }
        ProjectCommands::Get { name } => {
            let project: Project = client.get(&format!("/projects/{}", segment(&name)))?;
            ctx.print(&project)
        }
        ProjectCommands::Delete { name } => {
            client.delete(&format!("/projects/{}", segment(&name)))?;
            eprintln!("Deleted project '{name}' and its codesets");
            Ok(())
        }
    }
}
