//! Strata - multi-module release tool
//!
//! Usage:
//!   strata node show Domain/app
//!   strata artifact find com.acme:app
//!   strata workspace checkout Domain/app D/main

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_core::context::AppContext;
use strata_core::error::classify;
use strata_core::model::{ArtifactGroupId, Model, ModelError, NodeId, NodePath};
use strata_core::version::{ModuleVersion, Version};
use strata_core::workspace::{
    AllocateOptions, Workspace, WorkspaceAccessMode, WorkspaceDir, WorkspaceDirKind,
    WorkspaceDirTemplate,
};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Multi-module release tool", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect nodes of the model
    Node(NodeArgs),

    /// Resolve node properties
    Property(PropertyArgs),

    /// Inspect plugins defined for a node
    Plugin(PluginArgs),

    /// Map artifacts to modules
    Artifact(ArtifactArgs),

    /// Manage workspace directories
    Workspace(WorkspaceArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct NodeArgs {
    #[command(subcommand)]
    command: NodeSubcommand,
}

#[derive(Subcommand)]
enum NodeSubcommand {
    /// Show the type, state and children of a node
    Show {
        /// Node path, e.g. Domain/app (empty for the root)
        #[arg(default_value = "")]
        path: NodePath,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct PropertyArgs {
    #[command(subcommand)]
    command: PropertySubcommand,
}

#[derive(Subcommand)]
enum PropertySubcommand {
    /// Resolve a property for a node
    Get {
        path: NodePath,
        name: String,
    },
}

#[derive(Args)]
struct PluginArgs {
    #[command(subcommand)]
    command: PluginSubcommand,
}

#[derive(Subcommand)]
enum PluginSubcommand {
    /// List plugin ids defined for an interface
    List {
        path: NodePath,
        interface: String,
    },
}

#[derive(Args)]
struct ArtifactArgs {
    #[command(subcommand)]
    command: ArtifactSubcommand,
}

#[derive(Subcommand)]
enum ArtifactSubcommand {
    /// Find the module producing an artifact
    Find {
        /// Artifact as group:artifact
        artifact: ArtifactGroupId,
    },
}

#[derive(Args)]
struct WorkspaceArgs {
    #[command(subcommand)]
    command: WorkspaceSubcommand,
}

#[derive(Subcommand)]
enum WorkspaceSubcommand {
    /// List workspace directories
    List {
        /// Filter by kind
        #[arg(long)]
        kind: Option<DirKindArg>,

        /// Filter by module path
        #[arg(long)]
        module: Option<NodePath>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Allocate the directory of a module version
    Checkout {
        module: NodePath,
        /// Version as S/<name> or D/<name>
        version: Version,
    },

    /// Delete the directory of a module version
    #[command(alias = "rm")]
    Remove {
        module: NodePath,
        version: Version,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirKindArg {
    User,
    System,
}

impl From<DirKindArg> for WorkspaceDirKind {
    fn from(kind: DirKindArg) -> Self {
        match kind {
            DirKindArg::User => WorkspaceDirKind::User,
            DirKindArg::System => WorkspaceDirKind::System,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if classify(&err).is_user_facing() {
                eprintln!("Error: {:#}", err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    tracing::debug!(root = %root.display(), "loading configuration");
    let context = AppContext::load(root)?;

    match cli.command {
        Commands::Node(args) => match args.command {
            NodeSubcommand::Show { path, format } => run_node_show(&context, &path, format),
        },
        Commands::Property(args) => match args.command {
            PropertySubcommand::Get { path, name } => run_property_get(&context, &path, &name),
        },
        Commands::Plugin(args) => match args.command {
            PluginSubcommand::List { path, interface } => {
                run_plugin_list(&context, &path, &interface)
            }
        },
        Commands::Artifact(args) => match args.command {
            ArtifactSubcommand::Find { artifact } => run_artifact_find(&context, &artifact),
        },
        Commands::Workspace(args) => match args.command {
            WorkspaceSubcommand::List {
                kind,
                module,
                format,
            } => run_workspace_list(&context, kind, module, format),
            WorkspaceSubcommand::Checkout { module, version } => {
                run_workspace_checkout(&context, module, version)
            }
            WorkspaceSubcommand::Remove { module, version } => {
                run_workspace_remove(&context, module, version)
            }
        },
    }
}

fn require_node(model: &mut Model, path: &NodePath) -> Result<NodeId> {
    model.get_node(path)?.ok_or_else(|| {
        ModelError::NodeNotFound {
            path: path.to_string(),
        }
        .into()
    })
}

fn run_node_show(context: &AppContext, path: &NodePath, format: OutputFormat) -> Result<()> {
    let mut model = context.model()?;
    let node = require_node(&mut model, path)?;
    let node_type = model.node_type(node)?;
    let state = model.state(node)?;
    let children = model
        .children(node)?
        .into_iter()
        .map(|child| model.name(child).map(Option::unwrap_or_default))
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        OutputFormat::Table => {
            let display = if path.is_root() {
                "<root>".to_string()
            } else {
                path.to_string()
            };
            println!("{}", display);
            println!("  type:     {}", node_type.label());
            println!("  state:    {:?}", state);
            if children.is_empty() {
                println!("  children: (none)");
            } else {
                println!("  children: {}", children.join(", "));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.to_string(),
                "type": node_type,
                "state": state,
                "children": children,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn run_property_get(context: &AppContext, path: &NodePath, name: &str) -> Result<()> {
    let mut model = context.model()?;
    let node = require_node(&mut model, path)?;
    match model.get_property(node, name)? {
        Some(value) => println!("{}", value),
        None => println!("{} is not defined for {}", name, path),
    }
    Ok(())
}

fn run_plugin_list(context: &AppContext, path: &NodePath, interface: &str) -> Result<()> {
    let mut model = context.model()?;
    let node = require_node(&mut model, path)?;
    let ids = model.list_plugin_ids(node, interface)?;
    if ids.is_empty() {
        println!("No {} plugin ids defined for {}", interface, path);
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn run_artifact_find(context: &AppContext, artifact: &ArtifactGroupId) -> Result<()> {
    let mut model = context.model()?;
    match model.find_module_by_artifact_group_id(artifact)? {
        Some(module) => println!("{}", model.node_path(module)?),
        None => println!("No module produces {}", artifact),
    }
    Ok(())
}

fn run_workspace_list(
    context: &AppContext,
    kind: Option<DirKindArg>,
    module: Option<NodePath>,
    format: OutputFormat,
) -> Result<()> {
    let workspace = context.workspace()?;
    let template = WorkspaceDirTemplate {
        kind: kind.map(Into::into),
        module,
        version: None,
    };
    let dirs = workspace.list_directories(&template);

    match format {
        OutputFormat::Table => {
            if dirs.is_empty() {
                println!("No workspace directories");
            }
            for dir in &dirs {
                let path = workspace
                    .get_workspace_dir_path(dir)
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("{:<40} {}", dir.to_string(), path);
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = dirs
                .iter()
                .map(|dir| {
                    serde_json::json!({
                        "kind": dir.kind(),
                        "module": dir.module_path().to_string(),
                        "version": dir.version().map(ToString::to_string),
                        "path": workspace.get_workspace_dir_path(dir),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

/// Run `f` inside a workspace session, ending the session even when `f`
/// fails.
fn with_session<T>(
    workspace: &mut Workspace,
    f: impl FnOnce(&mut Workspace) -> Result<T>,
) -> Result<T> {
    workspace.start()?;
    let result = f(workspace);
    let ended = workspace.end();
    let value = result?;
    ended?;
    Ok(value)
}

fn user_dir(context: &AppContext, module: NodePath, version: Version) -> Result<WorkspaceDir> {
    let mut model = context.model()?;
    if model.get_module(&module)?.is_none() {
        return Err(ModelError::NodeNotFound {
            path: module.to_string(),
        }
        .into());
    }
    Ok(WorkspaceDir::UserModuleVersion(ModuleVersion::new(
        module, version,
    )?))
}

fn run_workspace_checkout(context: &AppContext, module: NodePath, version: Version) -> Result<()> {
    let dir = user_dir(context, module, version)?;
    let mut workspace = context.workspace()?;
    let path = with_session(&mut workspace, |workspace| {
        let path = workspace
            .allocate(
                &dir,
                WorkspaceAccessMode::ReadWrite,
                AllocateOptions::create_if_absent(),
            )?
            .ok_or_else(|| anyhow::anyhow!("No directory allocated for the {}", dir))?;
        workspace.release(&path)?;
        Ok(path)
    })?;
    println!("{}", path.display());
    Ok(())
}

fn run_workspace_remove(context: &AppContext, module: NodePath, version: Version) -> Result<()> {
    let dir = WorkspaceDir::UserModuleVersion(ModuleVersion::new(module, version)?);
    let mut workspace = context.workspace()?;
    with_session(&mut workspace, |workspace| {
        if workspace
            .allocate(&dir, WorkspaceAccessMode::ReadWrite, AllocateOptions::default())?
            .is_none()
        {
            bail!("The {} is not in the workspace", dir);
        }
        workspace.delete(&dir)?;
        Ok(())
    })?;
    println!("Removed the {}", dir);
    Ok(())
}
