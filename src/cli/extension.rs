use super::Context;
use super::commands::{
    CredentialsArgs, EndpointArgs, ExtensionArgs, ExtensionCommands, QueryArgs, ServiceArgs,
    ServiceRef,
};
use super::http_client::segment;
use super::output::load_payload;
use crate::types::{
    Extension, ExtensionCredentials, ExtensionEndpoint, ExtensionQuery, ExtensionService,
};

fn extension_payload(args: ExtensionArgs) -> anyhow::Result<Extension> {
    let mut extension: Extension = load_payload(args.file.as_deref())?;
    if let Some(id) = args.id {
        extension.id = id;
    }
    if let Some(product) = args.product {
        extension.product = product;
    }
    if let Some(version) = args.version {
        extension.version = version;
    }
    if let Some(description) = args.description {
        extension.description = description;
    }
    if let Some(zone) = args.zone {
        extension.zone = zone;
    }
    if let Some(configuration) = args.configuration {
        extension.configuration = configuration.into_inner();
    }
    if let Some(services) = args.services {
        extension.services = services.into_inner();
    }
    Ok(extension)
}

fn service_payload(args: ServiceArgs) -> anyhow::Result<ExtensionService> {
    let mut service: ExtensionService = load_payload(args.file.as_deref())?;
    if let Some(id) = args.id {
        service.id = id;
    }
    if let Some(resource) = args.resource {
        service.resource = resource;
    }
    if let Some(category) = args.category {
        service.category = category;
    }
    if let Some(auth_required) = args.auth_required {
        service.auth_required = auth_required;
    }
    if let Some(description) = args.description {
        service.description = description;
    }
    if let Some(configuration) = args.configuration {
        service.configuration = configuration.into_inner();
    }
    Ok(service)
}

fn endpoint_payload(args: EndpointArgs) -> anyhow::Result<ExtensionEndpoint> {
    let mut endpoint: ExtensionEndpoint = load_payload(args.file.as_deref())?;
    if let Some(url) = args.endpoint_url {
        endpoint.url = url;
    }
    if let Some(endpoint_type) = args.endpoint_type {
        endpoint.endpoint_type = endpoint_type;
    }
    if let Some(configuration) = args.configuration {
        endpoint.configuration = configuration.into_inner();
    }
    Ok(endpoint)
}

fn credentials_payload(args: CredentialsArgs) -> anyhow::Result<ExtensionCredentials> {
    let mut credentials: ExtensionCredentials = load_payload(args.file.as_deref())?;
    if let Some(id) = args.id {
        credentials.id = id;
    }
    if let Some(is_default) = args.default {
        credentials.is_default = is_default;
    }
    if let Some(scope) = args.scope {
        credentials.scope = scope;
    }
    if let Some(projects) = args.projects {
        credentials.projects = projects.into_inner();
    }
    if let Some(users) = args.users {
        credentials.users = users.into_inner();
    }
    if let Some(configuration) = args.configuration {
        credentials.configuration = configuration.into_inner();
    }
    Ok(credentials)
}

fn query_payload(args: QueryArgs) -> ExtensionQuery {
    ExtensionQuery {
        extension_id: args.extension_id,
        product: args.product,
        version_constraint: args.version_constraint,
        zone: args.zone,
        service_id: args.service_id,
        service_resource: args.service_resource,
        service_category: args.service_category,
        endpoint_url: args.endpoint_url,
        endpoint_type: args.endpoint_type,
        credentials_id: args.credentials_id,
        credentials_scope: args.credentials_scope,
        scope_project: args.scope_project,
        scope_user: args.scope_user,
        strict_labels: args.strict_labels,
    }
}

fn require_id<'a>(id: &'a str, flag: &str) -> anyhow::Result<&'a str> {
    if id.is_empty() {
        anyhow::bail!("{flag} is required (or set it in the --file payload)");
    }
    Ok(id)
}

fn service_path(parent: &ServiceRef) -> String {
    format!(
        "/extensions/{}/services/{}",
        segment(&parent.extension_id),
        segment(&parent.service_id)
    )
}

pub fn run_extension(ctx: &Context, command: ExtensionCommands) -> anyhow::Result<()> {
    let client = &ctx.client;
    match command {
        ExtensionCommands::Register(args) => {
            let extension = extension_payload(args)?;
            let created: Extension = client.post("/extensions", &extension)?;
            ctx.print(&created)
        }
        ExtensionCommands::List => {
            let extensions: Vec<Extension> = client.get("/extensions")?;
            ctx.print(&extensions)
        }
        ExtensionCommands::Query(args) => {
            let query = query_payload(args);
            let extensions: Vec<Extension> = client.get_with_query("/extensions", &query)?;
            if extensions.is_empty() {
                eprintln!("No matching extensions");
            }
            ctx.print(&extensions)
        }
        ExtensionCommands::Get { id } => {
            let extension: Extension = client.get(&format!("/extensions/{}", segment(&id)))?;
            ctx.print(&extension)
        }
        ExtensionCommands::Update(args) => {
            let extension = extension_payload(args)?;
            let id = require_id(&extension.id, "--id")?;
            let updated: Extension =
                client.put(&format!("/extensions/{}", segment(id)), &extension)?;
            ctx.print(&updated)
        }
        ExtensionCommands::Delete { id } => {
            client.delete(&format!("/extensions/{}", segment(&id)))?;
            eprintln!("Deleted extension '{id}'");
            Ok(())
        }

        ExtensionCommands::AddService {
            extension_id,
            service,
        } => {
            let service = service_payload(service)?;
            let created: ExtensionService = client.post(
                &format!("/extensions/{}/services", segment(&extension_id)),
                &service,
            )?;
            ctx.print(&created)
        }
        ExtensionCommands::ListServices { extension_id } => {
            let services: Vec<ExtensionService> =
                client.get(&format!("/extensions/{}/services", segment(&extension_id)))?;
            ctx.print(&services)
        }
        ExtensionCommands::GetService { extension_id, id } => {
            let service: ExtensionService = client.get(&format!(
                "/extensions/{}/services/{}",
                segment(&extension_id),
                segment(&id)
            ))?;
            ctx.print(&service)
        }
        ExtensionCommands::UpdateService {
            extension_id,
            service,
        } => {
            let service = service_payload(service)?;
            let id = require_id(&service.id, "--id")?;
            let updated: ExtensionService = client.put(
                &format!(
                    "/extensions/{}/services/{}",
                    segment(&extension_id),
                    segment(id)
                ),
                &service,
            )?;
            ctx.print(&updated)
        }
        ExtensionCommands::DeleteService { extension_id, id } => {
            client.delete(&format!(
                "/extensions/{}/services/{}",
                segment(&extension_id),
                segment(&id)
            ))?;
            eprintln!("Deleted service '{id}'");
            Ok(())
        }

        ExtensionCommands::AddEndpoint { parent, endpoint } => {
            let endpoint = endpoint_payload(endpoint)?;
            let created: ExtensionEndpoint =
                client.post(&format!("{}/endpoints", service_path(&parent)), &endpoint)?;
            ctx.print(&created)
        }
        ExtensionCommands::ListEndpoints { parent } => {
            let endpoints: Vec<ExtensionEndpoint> =
                client.get(&format!("{}/endpoints", service_path(&parent)))?;
            ctx.print(&endpoints)
        }
        ExtensionCommands::GetEndpoint {
            parent,
            endpoint_url,
        } => {
            let endpoint: ExtensionEndpoint = client.get(&format!(
                "{}/endpoints/{}",
                service_path(&parent),
                segment(&endpoint_url)
            ))?;
            ctx.print(&endpoint)
        }
        ExtensionCommands::UpdateEndpoint { parent, endpoint } => {
            let endpoint = endpoint_payload(endpoint)?;
            let url = require_id(&endpoint.url, "--endpoint-url")?;
            let updated: ExtensionEndpoint = client.put(
                &format!("{}/endpoints/{}", service_path(&parent), segment(url)),
                &endpoint,
            )?;
            ctx.print(&updated)
        }
        ExtensionCommands::DeleteEndpoint {
            parent,
            endpoint_url,
        } => {
            client.delete(&format!(
                "{}/endpoints/{}",
                service_path(&parent),
                segment(&endpoint_url)
            ))?;
            eprintln!("Deleted endpoint '{endpoint_url}'");
            Ok(())
        }

        ExtensionCommands::AddCredentials {
            parent,
            credentials,
        } => {
            let credentials = credentials_payload(credentials)?;
            let created: ExtensionCredentials =
                client.post(&format!("{}/credentials", service_path(&parent)), &credentials)?;
            ctx.print(&created)
        }
        ExtensionCommands::ListCredentials { parent } => {
            let credentials: Vec<ExtensionCredentials> =
                client.get(&format!("{}/credentials", service_path(&parent)))?;
            ctx.print(&credentials)
        }
        ExtensionCommands::GetCredentials { parent, id } => {
            let credentials: ExtensionCredentials = client.get(&format!(
                "{}/credentials/{}",
                service_path(&parent),
                segment(&id)
            ))?;
            ctx.print(&credentials)
        }
        ExtensionCommands::UpdateCredentials {
            parent,
            credentials,
        } => {
            let credentials = credentials_payload(credentials)?;
            let id = require_id(&credentials.id, "--id")?;
            let updated: ExtensionCredentials = client.put(
                &format!("{}/credentials/{}", service_path(&parent), segment(id)),
                &credentials,
            )?;
            ctx.print(&updated)
        }
        ExtensionCommands::DeleteCredentials { parent, id } => {
            client.delete(&format!(
                "{}/credentials/{}",
                service_path(&parent),
                segment(&id)
            ))?;
            eprintln!("Deleted credentials '{id}'");
            Ok(())
        }
    }
}
