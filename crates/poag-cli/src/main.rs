//! POAG - Product-Owner Agent Graph CLI
//!
//! The `poag` command plans a development request across the components of
//! a multi-flake project.
//!
//! ## Commands
//!
//! - `plan`: route a request to the relevant components and collect plans
//! - `clear`: forget initialization so components are explored again
//! - `ls`: list components, or the current one and its neighbors
//! - `describe`: JSON description of one component
//! - `graph`: component dependency graph as Mermaid

mod classifier;
mod claude;
mod reply;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use poag_core::{
    clear, describe_node, init_tracing, neighborhood, node_for_dir, Home, Manifest,
    OrchestrationEngine, PoagConfig, Project, ProjectRevision, TracingReporter, Workspace,
};
use poag_flake::{discover, NixMetadata, FLAKE_NIX};
use tracing::{info, warn, Level};

use crate::classifier::AnthropicClassifier;
use crate::claude::ClaudeCodeAgent;

#[derive(Parser)]
#[command(name = "poag")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Product-Owner Agent Graph: dependency-aware planning across flakes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project root (default: outermost directory above cwd with a flake.nix)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Read components from a JSON manifest instead of discovering flakes
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a development plan for a request
    Plan {
        /// The request (read from stdin when omitted)
        request: Option<String>,
    },

    /// Clear initialization state and contracts to force re-exploration
    Clear {
        /// Only this component (default: all)
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// List the components of the project
    Ls {
        /// Only the current component, its dependencies and its dependents
        #[arg(short, long)]
        neighbors: bool,
    },

    /// Describe one component as JSON
    Describe {
        /// Component name
        name: String,
    },

    /// Print the component dependency graph as Mermaid
    Graph,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let home = Home::from_env()?;
    let config = home.load_config().with_overrides(|key| std::env::var(key).ok());
    let root = resolve_root(cli.root)?;
    let project = load_project(&root, cli.manifest.as_deref())?;
    let revisions = ProjectRevision::from_project(&project);
    let ws = Workspace::new(
        project,
        &home.state_dir,
        Arc::new(revisions),
        Arc::new(TracingReporter),
    );

    match cli.command {
        Commands::Plan { request } => cmd_plan(ws, &config, request).await,
        Commands::Clear { agent } => cmd_clear(&ws, agent.as_deref()),
        Commands::Ls { neighbors } => cmd_ls(&ws, neighbors),
        Commands::Describe { name } => cmd_describe(&ws, &name),
        Commands::Graph => {
            print!("{}", ws.project.graph().to_mermaid());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// The explicit root, else the outermost ancestor of cwd holding a
/// `flake.nix`, else cwd.
fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let cwd = std::env::current_dir().context("cannot read current directory")?;
    Ok(cwd
        .ancestors()
        .filter(|dir| dir.join(FLAKE_NIX).is_file())
        .last()
        .map(Path::to_path_buf)
        .unwrap_or(cwd))
}

fn load_project(root: &Path, manifest: Option<&Path>) -> Result<Project> {
    let manifest = match manifest {
        Some(path) => Manifest::load(path)
            .with_context(|| format!("cannot load manifest {}", path.display()))?,
        None => discover(root, &NixMetadata)
            .with_context(|| format!("cannot discover flakes under {}", root.display()))?,
    };
    Ok(Project::from_manifest(root, &manifest)?)
}

async fn cmd_plan(ws: Workspace, config: &PoagConfig, request: Option<String>) -> Result<ExitCode> {
    let request = match request {
        Some(request) => request,
        None if !std::io::stdin().is_terminal() => {
            std::io::read_to_string(std::io::stdin()).context("cannot read request from stdin")?
        }
        None => bail!("no request provided (usage: poag plan <request>, or pipe it on stdin)"),
    };
    let request = request.trim();
    if request.is_empty() {
        bail!("empty request");
    }

    info!(event = "plan.start", root = %ws.project.root().display());
    let agent = Arc::new(ClaudeCodeAgent::from_config(config));
    let classifier =
        AnthropicClassifier::from_config(config).context("cannot build HTTP client")?;
    let engine = OrchestrationEngine::new(ws, agent.clone(), agent)
        .with_classifier(Arc::new(classifier));

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        warn!(event = "plan.interrupted", "consolidating finished plans");
    };
    let state = engine.run_until(request, interrupted).await?;

    let Some(output) = state.consolidated_output else {
        bail!("run finished without consolidated output");
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(if output.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_clear(ws: &Workspace, agent: Option<&str>) -> Result<ExitCode> {
    let report = clear(ws, agent)?;
    match agent {
        Some(name) if report.checkpoints.is_empty() => {
            println!("{name} was not initialized for this project");
        }
        _ if report.checkpoints.is_empty() => {
            println!("No initialized components found for this project");
        }
        _ => println!(
            "Cleared initialization state for {} component(s): {}",
            report.checkpoints.len(),
            report.checkpoints.join(", ")
        ),
    }
    if !report.contracts.is_empty() {
        println!("Deleted contracts of: {}", report.contracts.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_ls(ws: &Workspace, neighbors: bool) -> Result<ExitCode> {
    let project = &ws.project;
    let (current, names) = if neighbors {
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        let Some(current) = node_for_dir(project, &cwd) else {
            bail!("could not detect the current component; run from a component directory");
        };
        let names = neighborhood(project, &current)?;
        (Some(current), names)
    } else {
        (None, project.nodes().map(|n| n.name.clone()).collect())
    };

    let mut nodes: Vec<_> = names
        .iter()
        .map(|name| project.node(name))
        .collect::<poag_core::Result<Vec<_>>>()?;
    nodes.sort_by(|a, b| a.path.cmp(&b.path));

    match &current {
        Some(current) => println!("Neighbors of {current}"),
        None => println!("Components in {}", project.root().display()),
    }
    println!("{:<24} {:<24} {:<10} DEPENDENCIES", "NAME", "PATH", "LANGUAGE");
    for node in &nodes {
        let mut name = node.name.clone();
        if current.as_deref() == Some(node.name.as_str()) {
            name.push_str(" <- current");
        }
        let deps = if node.dependencies.is_empty() {
            "none".to_string()
        } else {
            node.dependencies.join(", ")
        };
        println!(
            "{:<24} {:<24} {:<10} {}",
            name,
            node.path.display(),
            node.language,
            deps
        );
    }

    let (initialized, pending): (Vec<&str>, Vec<&str>) = names
        .iter()
        .map(String::as_str)
        .partition(|name| ws.is_initialized(name));
    if !initialized.is_empty() {
        println!("\nInitialized: {}", initialized.join(", "));
    }
    if !pending.is_empty() {
        println!("Not initialized: {}", pending.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_describe(ws: &Workspace, name: &str) -> Result<ExitCode> {
    let description = describe_node(ws, name)?;
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(ExitCode::SUCCESS)
}
