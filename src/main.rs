use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fuseml_core::cli::{
    CodesetCommands, Context, ExtensionCommands, GlobalArgs, ProjectCommands, RunnableCommands,
    WorkflowCommands, run_codeset, run_extension, run_project, run_runnable, run_version,
    run_workflow,
};
use fuseml_core::config::ServerConfig;
use fuseml_core::server::{AppState, create_router};
use fuseml_core::service::Services;

#[derive(Parser)]
#[command(name = "fuseml")]
#[command(about = "FuseML control plane server and client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the configuration file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the configuration file)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Manage extensions and query the extension registry
    Extension {
        #[command(subcommand)]
        command: ExtensionCommands,
    },

    /// Manage codesets
    Codeset {
        #[command(subcommand)]
        command: CodesetCommands,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage runnables
    Runnable {
        #[command(subcommand)]
        command: RunnableCommands,
    },

    /// Manage workflows
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// Show client and server versions
    Version,
}

fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.is_empty() => EnvFilter::try_new(value)?,
        _ => EnvFilter::try_new(default_directive)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(Services::in_memory()));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn run_server(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    verbose: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    }
    .with_overrides(host, port);
    init_tracing(if verbose {
        "fuseml_core=debug"
    } else {
        config.log_filter.as_str()
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

fn run_client(global: &GlobalArgs, command: Commands) -> anyhow::Result<()> {
    init_tracing(if global.verbose {
        "fuseml_core=debug"
    } else {
        "fuseml_core=warn"
    })?;
    let ctx = Context::new(global)?;

    match command {
        Commands::Serve { .. } => anyhow::bail!("'serve' does not talk to a server"),
        Commands::Extension { command } => run_extension(&ctx, command),
        Commands::Codeset { command } => run_codeset(&ctx, command),
        Commands::Project { command } => run_project(&ctx, command),
        Commands::Runnable { command } => run_runnable(&ctx, command),
        Commands::Workflow { command } => run_workflow(&ctx, command),
        Commands::Version => run_version(&ctx),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            run_server(config, host, port, cli.global.verbose)
        }
        command => run_client(&cli.global, command),
    }
}
