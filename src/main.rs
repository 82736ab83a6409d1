mod cache_bust;
mod config;
mod icon;
mod live_reload;
mod markup;
mod no_cache;
mod project_serve;
mod registry;
mod server;
mod sync;
mod translate;

#[cfg(test)]
mod test_helpers;

use std::{env, path::PathBuf, process::exit, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    config::{
        DEFAULT_ENTRY_FILE, DEFAULT_PROJECT_PORT, DEFAULT_PROJECT_PREFIX, DEFAULT_SYSTEM_PORT,
        ServeConfig, WorkspaceConfig,
    },
    icon::IconKind,
    registry::ProjectRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "nrd-dev", about = "Development tools for the NRD static sites", version)]
struct Cli {
    #[command(flatten)]
    workspace: WorkspaceArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct WorkspaceArgs {
    /// Directory holding the projects (default: current directory, or its
    /// parent inside a project)
    #[arg(long, global = true, env = "NRD_PROJECTS_DIR", value_name = "DIR")]
    projects_dir: Option<PathBuf>,

    /// Name prefix identifying project directories
    #[arg(long, global = true, env = "NRD_PROJECT_PREFIX", default_value = DEFAULT_PROJECT_PREFIX)]
    prefix: String,

    /// Page served for a project root
    #[arg(long, global = true, default_value = DEFAULT_ENTRY_FILE, value_name = "FILE")]
    entry_file: String,

    /// URL prefix of compiled library output served from the projects directory
    #[arg(long = "library-prefix", global = true, value_name = "PREFIX")]
    library_prefixes: Vec<String>,
}

impl WorkspaceArgs {
    fn into_config(self) -> Result<WorkspaceConfig> {
        let current_dir = env::current_dir().context("cannot determine current directory")?;
        Ok(WorkspaceConfig::resolve(
            self.projects_dir,
            &current_dir,
            self.prefix,
            self.entry_file,
            self.library_prefixes,
        ))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve every project on one port with live reload
    System(SystemOptions),

    /// Serve a single project
    Serve(ServeOptions),

    /// Serve every project on its own port
    StartAll(StartAllOptions),

    /// Refresh the cache-busting markers of a project's entry page
    UpdateVersion(ProjectOptions),

    /// Copy the shared modules into one or every project
    SyncCommon(SyncOptions),

    /// Write the 192px and 512px icons of an app as SVG and PNG
    GenerateIcon(IconOptions),
}

#[derive(Debug, Args)]
struct SystemOptions {
    #[arg(default_value_t = DEFAULT_SYSTEM_PORT)]
    port: u16,

    /// Milliseconds between live reload scans
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    poll_interval_ms: u64,

    #[arg(long)]
    no_live_reload: bool,

    #[arg(long)]
    no_update_version: bool,

    /// Open the project listing in the default browser
    #[arg(long)]
    open: bool,
}

#[derive(Debug, Args)]
struct ServeOptions {
    /// Project to serve (default: the project containing the current directory)
    project: Option<String>,

    #[arg(default_value_t = DEFAULT_PROJECT_PORT)]
    port: u16,

    #[arg(long)]
    live_reload: bool,

    #[arg(long)]
    no_update_version: bool,

    /// Open the project in the default browser
    #[arg(long)]
    open: bool,
}

#[derive(Debug, Args)]
struct StartAllOptions {
    /// Port of the first project; the others follow
    #[arg(long, default_value_t = DEFAULT_PROJECT_PORT)]
    base_port: u16,

    #[arg(long)]
    no_update_version: bool,
}

#[derive(Debug, Args)]
struct ProjectOptions {
    /// Project to update (default: the project containing the current directory)
    project: Option<String>,
}

#[derive(Debug, Args)]
struct SyncOptions {
    /// Only sync this project
    project: Option<String>,

    /// Source of the shared modules (default: <projects-dir>/nrd-common)
    #[arg(long, value_name = "DIR")]
    common_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct IconOptions {
    /// Icon text; `|` separates title and subtitle
    text: String,

    #[arg(default_value = ".")]
    out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    kind: IconKind,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let workspace = self.workspace.into_config()?;
        match self.command {
            Command::System(opts) => run_system(&workspace, opts).await,
            Command::Serve(opts) => run_serve(&workspace, opts).await,
            Command::StartAll(opts) => run_start_all(&workspace, opts).await,
            Command::UpdateVersion(opts) => run_update_version(&workspace, opts),
            Command::SyncCommon(opts) => run_sync_common(&workspace, opts),
            Command::GenerateIcon(opts) => run_generate_icon(opts),
        }
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = Cli::parse().run().await {
        error!("{error:#}");
        exit(1);
    }
}

async fn run_system(workspace: &WorkspaceConfig, opts: SystemOptions) -> Result<()> {
    let config = ServeConfig {
        port: opts.port,
        live_reload: !opts.no_live_reload,
        poll_interval: Duration::from_millis(opts.poll_interval_ms),
        update_version: !opts.no_update_version,
        open_browser: opts.open,
    };
    server::run_system(workspace, &config).await
}

async fn run_serve(workspace: &WorkspaceConfig, opts: ServeOptions) -> Result<()> {
    let project = project_or_current(workspace, opts.project)?;
    let config = ServeConfig {
        port: opts.port,
        live_reload: opts.live_reload,
        poll_interval: config::DEFAULT_POLL_INTERVAL,
        update_version: !opts.no_update_version,
        open_browser: opts.open,
    };
    server::run_project(workspace, &config, &project).await
}

async fn run_start_all(workspace: &WorkspaceConfig, opts: StartAllOptions) -> Result<()> {
    let config = ServeConfig {
        port: opts.base_port,
        live_reload: false,
        poll_interval: config::DEFAULT_POLL_INTERVAL,
        update_version: !opts.no_update_version,
        open_browser: false,
    };
    server::run_all(workspace, &config).await
}

fn run_update_version(workspace: &WorkspaceConfig, opts: ProjectOptions) -> Result<()> {
    let project = project_or_current(workspace, opts.project)?;
    let registry = ProjectRegistry::single(
        &workspace.projects_dir,
        &project,
        &workspace.prefix,
        &workspace.entry_file,
    )?;
    let project = registry.default_project().unwrap_or(&project);
    let entry = cache_bust::update_project(
        &registry.project_root(project),
        registry.entry_file(),
        cache_bust::current_version(),
    )?;
    info!(entry = %entry.display(), "cache busting markers refreshed");
    Ok(())
}

fn run_sync_common(workspace: &WorkspaceConfig, opts: SyncOptions) -> Result<()> {
    let common_dir = opts.common_dir.unwrap_or_else(|| workspace.common_dir());
    if !common_dir.is_dir() {
        bail!("common directory {} not found", common_dir.display());
    }

    let registry = ProjectRegistry::discover(
        &workspace.projects_dir,
        &workspace.prefix,
        &workspace.entry_file,
    )?;
    let common_name = common_dir.file_name().and_then(|name| name.to_str());
    let projects: Vec<String> = registry
        .names()
        .iter()
        .filter(|name| Some(name.as_str()) != common_name)
        .cloned()
        .collect();

    if let Some(project) = opts.project {
        if !projects.contains(&project) {
            bail!(
                "project '{project}' is not a known project; available projects: {}",
                projects.join(", ")
            );
        }
        sync::sync_project(&common_dir, &workspace.projects_dir, &project)?;
        info!(project = %project, "sync complete");
        return Ok(());
    }

    let summary = sync::sync_all(&common_dir, &workspace.projects_dir, &projects);
    info!(
        "sync complete ({}/{} projects)",
        summary.synced, summary.total
    );
    Ok(())
}

fn run_generate_icon(opts: IconOptions) -> Result<()> {
    info!(text = %opts.text, kind = ?opts.kind, dir = %opts.out_dir.display(), "generating icons");
    icon::write_icons(&opts.text, &opts.out_dir, opts.kind)?;
    Ok(())
}

/// Explicit project name, or the project the current directory belongs to.
fn project_or_current(workspace: &WorkspaceConfig, project: Option<String>) -> Result<String> {
    if let Some(project) = project {
        return Ok(project);
    }
    let current_dir = env::current_dir().context("cannot determine current directory")?;
    match workspace.project_of(&current_dir) {
        Some(project) => Ok(project.to_string()),
        None => bail!(
            "no project given and {} is not a '{}*' project directory",
            current_dir.display(),
            workspace.prefix
        ),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn system_defaults_to_port_80() {
        let cli = Cli::try_parse_from(["nrd-dev", "system"]).unwrap();
        let Command::System(opts) = cli.command else {
            panic!("expected system");
        };
        assert_eq!(opts.port, 80);
        assert!(!opts.no_live_reload);
    }

    #[test]
    fn serve_takes_project_then_port() {
        let cli = Cli::try_parse_from(["nrd-dev", "serve", "nrd-rrhh", "9000"]).unwrap();
        let Command::Serve(opts) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(opts.project.as_deref(), Some("nrd-rrhh"));
        assert_eq!(opts.port, 9000);

        let cli = Cli::try_parse_from(["nrd-dev", "serve"]).unwrap();
        let Command::Serve(opts) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(opts.port, 8006);
        assert!(!opts.open);

        let cli = Cli::try_parse_from(["nrd-dev", "serve", "nrd-rrhh", "--open"]).unwrap();
        let Command::Serve(opts) = cli.command else {
            panic!("expected serve");
        };
        assert!(opts.open);
    }

    #[test]
    fn icon_kind_parses() {
        let cli =
            Cli::try_parse_from(["nrd-dev", "generate-icon", "Panadería|Nueva", "--kind", "bakery"])
                .unwrap();
        let Command::GenerateIcon(opts) = cli.command else {
            panic!("expected generate-icon");
        };
        assert_eq!(opts.kind, IconKind::Bakery);
        assert_eq!(opts.out_dir, PathBuf::from("."));
    }
}
