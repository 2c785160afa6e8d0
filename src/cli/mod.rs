mod codeset;
mod commands;
mod extension;
pub mod http_client;
pub mod output;
mod runnable;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use codeset::{run_codeset, run_project};
pub use commands::{
    CodesetCommands, ExtensionCommands, GlobalArgs, ProjectCommands, RunnableCommands,
    WorkflowCommands,
};
pub use extension::run_extension;
pub use runnable::{run_runnable, run_workflow};

use http_client::ApiClient;
use output::OutputFormat;

/// Everything a client command needs: where to send requests and how to print replies.
pub struct Context {
    pub client: ApiClient,
    pub output: OutputFormat,
}

impl Context {
    pub fn new(args: &GlobalArgs) -> anyhow::Result<Self> {
        let client = ApiClient::new(&args.url, Duration::from_secs(args.timeout), args.verbose)?;
        Ok(Self {
            client,
            output: args.output,
        })
    }

    pub fn print<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        self.output.print(value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionInfo {
    #[serde(default)]
    name: String,
    version: String,
}

/// Prints the client version next to the server's.
pub fn run_version(ctx: &Context) -> anyhow::Result<()> {
    let server: VersionInfo = ctx.client.get("/version")?;
    let client = VersionInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    ctx.print(&serde_json::json!({ "client": client, "server": server }))
}
