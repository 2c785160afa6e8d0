use std::path::PathBuf;

use clap::{Args, Subcommand};

use super::output::{OutputFormat, Yaml, parse_key_value};
use crate::types::{
    Configuration, CredentialsScope, EndpointType, ExtensionService, RunnableImage, RunnableInput,
    RunnableOutput, WorkflowInput, WorkflowOutput, WorkflowStep,
};

/// Flags shared by every client command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// URL of the FuseML server
    #[arg(long, global = true, env = "FUSEML_URL", default_value = super::http_client::DEFAULT_URL)]
    pub url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    /// Log every request and response
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

#[derive(Debug, Subcommand)]
pub enum ExtensionCommands {
    /// Register an extension, optionally with its services, endpoints and credentials
    Register(ExtensionArgs),

    /// List all registered extensions
    List,

    /// Find extensions, services, endpoints and credentials matching a query
    Query(QueryArgs),

    /// Show an extension
    Get {
        /// Extension ID
        #[arg(long)]
        id: String,
    },

    /// Update an extension's attributes
    Update(ExtensionArgs),

    /// Delete an extension and everything under it
    Delete {
        /// Extension ID
        #[arg(long)]
        id: String,
    },

    /// Add a service to an extension
    AddService {
        #[arg(long)]
        extension_id: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// List the services of an extension
    ListServices {
        #[arg(long)]
        extension_id: String,
    },

    /// Show a service
    GetService {
        #[arg(long)]
        extension_id: String,

        /// Service ID
        #[arg(long)]
        id: String,
    },

    /// Update a service's attributes
    UpdateService {
        #[arg(long)]
        extension_id: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Delete a service and its endpoints and credentials
    DeleteService {
        #[arg(long)]
        extension_id: String,

        /// Service ID
        #[arg(long)]
        id: String,
    },

    /// Add an endpoint to a service
    AddEndpoint {
        #[command(flatten)]
        parent: ServiceRef,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// List the endpoints of a service
    ListEndpoints {
        #[command(flatten)]
        parent: ServiceRef,
    },

    /// Show an endpoint
    GetEndpoint {
        #[command(flatten)]
        parent: ServiceRef,

        /// Endpoint URL
        #[arg(long)]
        endpoint_url: String,
    },

    /// Update an endpoint
    UpdateEndpoint {
        #[command(flatten)]
        parent: ServiceRef,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Delete an endpoint
    DeleteEndpoint {
        #[command(flatten)]
        parent: ServiceRef,

        /// Endpoint URL
        #[arg(long)]
        endpoint_url: String,
    },

    /// Add credentials to a service
    AddCredentials {
        #[command(flatten)]
        parent: ServiceRef,

        #[command(flatten)]
        credentials: CredentialsArgs,
    },

    /// List the credentials of a service
    ListCredentials {
        #[command(flatten)]
        parent: ServiceRef,
    },

    /// Show credentials
    GetCredentials {
        #[command(flatten)]
        parent: ServiceRef,

        /// Credentials ID
        #[arg(long)]
        id: String,
    },

    /// Update credentials
    UpdateCredentials {
        #[command(flatten)]
        parent: ServiceRef,

        #[command(flatten)]
        credentials: CredentialsArgs,
    },

    /// Delete credentials
    DeleteCredentials {
        #[command(flatten)]
        parent: ServiceRef,

        /// Credentials ID
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ServiceRef {
    #[arg(long)]
    pub extension_id: String,

    #[arg(long)]
    pub service_id: String,
}

#[derive(Debug, Args)]
pub struct ExtensionArgs {
    /// Read the extension from a YAML or JSON file; flags override its fields
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Extension ID (generated from the product name when omitted)
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub product: Option<String>,

    /// Semantic version, e.g. 1.19.0
    #[arg(long)]
    pub version: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Zone the extension runs in
    #[arg(long)]
    pub zone: Option<String>,

    /// Configuration as a YAML map, e.g. '{region: eu}'
    #[arg(long)]
    pub configuration: Option<Yaml<Configuration>>,

    /// Services as a YAML list
    #[arg(long)]
    pub services: Option<Yaml<Vec<ExtensionService>>>,
}

#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Read the service from a YAML or JSON file; flags override its fields
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Service ID (generated from the resource when omitted)
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub resource: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Credentials are required to access this service
    #[arg(long)]
    pub auth_required: Option<bool>,

    #[arg(long)]
    pub description: Option<String>,

    /// Configuration as a YAML map
    #[arg(long)]
    pub configuration: Option<Yaml<Configuration>>,
}

#[derive(Debug, Args)]
pub struct EndpointArgs {
    /// Read the endpoint from a YAML or JSON file; flags override its fields
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Endpoint URL
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Endpoint type
    #[arg(long = "type", value_parser = parse_endpoint_type)]
    pub endpoint_type: Option<EndpointType>,

    /// Configuration as a YAML map
    #[arg(long)]
    pub configuration: Option<Yaml<Configuration>>,
}

#[derive(Debug, Args)]
pub struct CredentialsArgs {
    /// Read the credentials from a YAML or JSON file; flags override its fields
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Credentials ID (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Use these credentials when several match equally
    #[arg(long)]
    pub default: Option<bool>,

    #[arg(long, value_parser = parse_scope)]
    pub scope: Option<CredentialsScope>,

    /// Projects as a YAML list
    #[arg(long)]
    pub projects: Option<Yaml<Vec<String>>>,

    /// Users as a YAML list
    #[arg(long)]
    pub users: Option<Yaml<Vec<String>>>,

    /// Configuration as a YAML map
    #[arg(long)]
    pub configuration: Option<Yaml<Configuration>>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(long)]
    pub extension_id: Option<String>,

    #[arg(long)]
    pub product: Option<String>,

    /// Semantic version constraint, e.g. '>=1.0, <2'
    #[arg(long)]
    pub version_constraint: Option<String>,

    /// Zone of the caller, makes internal endpoints eligible
    #[arg(long)]
    pub zone: Option<String>,

    #[arg(long)]
    pub service_id: Option<String>,

    #[arg(long)]
    pub service_resource: Option<String>,

    #[arg(long)]
    pub service_category: Option<String>,

    #[arg(long)]
    pub endpoint_url: Option<String>,

    #[arg(long, value_parser = parse_endpoint_type)]
    pub endpoint_type: Option<EndpointType>,

    #[arg(long)]
    pub credentials_id: Option<String>,

    #[arg(long, value_parser = parse_scope)]
    pub credentials_scope: Option<CredentialsScope>,

    /// Project the credentials must be usable from
    #[arg(long)]
    pub scope_project: Option<String>,

    /// User the credentials must be usable by
    #[arg(long)]
    pub scope_user: Option<String>,

    /// Exclude extensions lacking a label targeted by the query
    #[arg(long)]
    pub strict_labels: bool,
}

#[derive(Debug, Subcommand)]
pub enum CodesetCommands {
    /// Register a codeset
    Register {
        /// Read the codeset from a YAML or JSON file; flags override its fields
        #[arg(long, short)]
        file: Option<PathBuf>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Labels as a YAML list
        #[arg(long)]
        labels: Option<Yaml<Vec<String>>>,

        /// Repository URL
        #[arg(long)]
        repo_url: Option<String>,
    },

    /// List codesets
    List {
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        label: Option<String>,
    },

    /// Show a codeset
    Get {
        #[arg(long)]
        project: String,

        #[arg(long)]
        name: String,
    },

    /// Delete a codeset
    Delete {
        #[arg(long)]
        project: String,

        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List,

    /// Show a project
    Get {
        #[arg(long)]
        name: String,
    },

    /// Delete a project and its codesets
    Delete {
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RunnableCommands {
    /// Register a runnable
    Register {
        /// Read the runnable from a YAML or JSON file; flags override its fields
        #[arg(long, short)]
        file: Option<PathBuf>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Image as a YAML map, e.g. '{repository: fuseml/builder, tag: "1.0"}'
        #[arg(long)]
        image: Option<Yaml<RunnableImage>>,

        /// Inputs as a YAML list
        #[arg(long)]
        inputs: Option<Yaml<Vec<RunnableInput>>>,

        /// Outputs as a YAML list
        #[arg(long)]
        outputs: Option<Yaml<Vec<RunnableOutput>>>,

        /// Labels as a YAML map
        #[arg(long)]
        labels: Option<Yaml<Configuration>>,
    },

    /// List runnables
    List {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        kind: Option<String>,

        /// Label to match, as key=value (repeatable)
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,
    },

    /// Show a runnable
    Get {
        /// Runnable name or ID
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommands {
    /// Register a workflow
    Register {
        /// Read the workflow from a YAML or JSON file; flags override its fields
        #[arg(long, short)]
        file: Option<PathBuf>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Inputs as a YAML list
        #[arg(long)]
        inputs: Option<Yaml<Vec<WorkflowInput>>>,

        /// Outputs as a YAML list
        #[arg(long)]
        outputs: Option<Yaml<Vec<WorkflowOutput>>>,

        /// Steps as a YAML list
        #[arg(long)]
        steps: Option<Yaml<Vec<WorkflowStep>>>,
    },

    /// List workflows
    List {
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a workflow
    Get {
        /// Workflow name or ID
        #[arg(long)]
        name: String,
    },
}

fn parse_endpoint_type(s: &str) -> Result<EndpointType, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

fn parse_scope(s: &str) -> Result<CredentialsScope, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}
