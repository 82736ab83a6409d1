use std::{io, net::SocketAddr, sync::Arc};

use axum::Router;
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    cache_bust::{current_version, update_project},
    config::{CLIENT_POLL_INTERVAL, ServeConfig, WorkspaceConfig},
    live_reload::{LiveReload, WatchState, Watcher},
    no_cache::NoCacheLayer,
    project_serve::{ProjectServeDir, RootPage},
    registry::ProjectRegistry,
};

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(
        "port {port} needs administrator privileges; run with sudo or use a port above 1023 (e.g. 8006)"
    )]
    Privileged {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("port {port} is already in use; a server may already be running at http://localhost:{port}/")]
    InUse {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("cannot listen on port {port}")]
    Other {
        port: u16,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    pub fn classify(port: u16, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::Privileged { port, source },
            io::ErrorKind::AddrInUse => Self::InUse { port, source },
            _ => Self::Other { port, source },
        }
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::classify(addr.port(), source))
}

/// Refreshes the cache-busting markers of every project in the registry.
/// Failures only cost the affected project its fresh version.
pub fn update_versions(registry: &ProjectRegistry) {
    let version = current_version();
    for project in registry.names() {
        if let Err(error) = update_project(
            &registry.project_root(project),
            registry.entry_file(),
            version,
        ) {
            warn!(project = %project, "{error:#}");
        }
    }
}

/// Builds the application serving `registry`, starting the live reload
/// poller when enabled.
pub fn app(
    registry: Arc<ProjectRegistry>,
    workspace: &WorkspaceConfig,
    config: &ServeConfig,
    root_page: RootPage,
) -> Router {
    let live = config.live_reload.then(|| {
        let state = WatchState::default();
        Watcher::new(registry.roots(), state.clone(), config.poll_interval).spawn();
        LiveReload::new(state, CLIENT_POLL_INTERVAL)
    });

    let service = ProjectServeDir::new(registry, workspace.library_prefixes.clone())
        .root_page(root_page)
        .live_reload(live);

    Router::new()
        .fallback_service(service)
        .layer(NoCacheLayer)
}

/// Every project on one port, with the registry listing at `/`.
pub async fn run_system(workspace: &WorkspaceConfig, config: &ServeConfig) -> anyhow::Result<()> {
    let registry = Arc::new(ProjectRegistry::discover(
        &workspace.projects_dir,
        &workspace.prefix,
        &workspace.entry_file,
    )?);

    if config.update_version {
        info!("updating project versions");
        update_versions(&registry);
    }

    let app = app(registry.clone(), workspace, config, RootPage::Listing);
    let listener = bind(config.addr()).await?;

    info!(
        dir = %workspace.projects_dir.display(),
        port = config.port,
        live_reload = config.live_reload,
        "serving all projects at http://localhost:{}/",
        config.port
    );
    for project in registry.names() {
        info!("  http://localhost:{}/{project}/", config.port);
    }
    if config.open_browser {
        open_browser(&format!("http://localhost:{}/", config.port));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

/// One project on one port; `/` redirects to it.
pub async fn run_project(
    workspace: &WorkspaceConfig,
    config: &ServeConfig,
    project: &str,
) -> anyhow::Result<()> {
    let registry = Arc::new(ProjectRegistry::single(
        &workspace.projects_dir,
        project,
        &workspace.prefix,
        &workspace.entry_file,
    )?);
    let project = registry.default_project().unwrap_or(project).to_string();

    if config.update_version {
        update_versions(&registry);
    }

    let app = app(
        registry,
        workspace,
        config,
        RootPage::Redirect(project.clone()),
    );
    let listener = bind(config.addr()).await?;

    let url = format!("http://localhost:{}/{project}/", config.port);
    info!(project = %project, port = config.port, "serving {url}");
    if config.open_browser {
        open_browser(&url);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(project = %project, "server stopped");
    Ok(())
}

/// Each project on its own port, counting up from `config.port` in registry
/// order. Projects whose port cannot be bound are skipped.
pub async fn run_all(workspace: &WorkspaceConfig, config: &ServeConfig) -> anyhow::Result<()> {
    let registry = ProjectRegistry::discover(
        &workspace.projects_dir,
        &workspace.prefix,
        &workspace.entry_file,
    )?;

    if config.update_version {
        update_versions(&registry);
    }

    let mut servers = Vec::new();
    for (offset, project) in registry.names().iter().enumerate() {
        let Some(port) = u16::try_from(offset)
            .ok()
            .and_then(|offset| config.port.checked_add(offset))
        else {
            warn!(project = %project, "out of ports, skipping");
            continue;
        };
        let project_config = ServeConfig {
            port,
            update_version: false,
            open_browser: false,
            ..config.clone()
        };

        let listener = match bind(project_config.addr()).await {
            Ok(listener) => listener,
            Err(error) => {
                warn!(project = %project, "{error}, skipping");
                continue;
            }
        };
        let single = Arc::new(ProjectRegistry::from_names(
            registry.projects_dir(),
            registry.entry_file(),
            vec![project.clone()],
        ));
        let app = app(
            single,
            workspace,
            &project_config,
            RootPage::Redirect(project.clone()),
        );
        info!("  {project}: http://localhost:{port}/{project}/");

        let project = project.clone();
        servers.push(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await;
            if let Err(error) = served {
                warn!(project = %project, %error, "server failed");
            }
        });
    }

    if servers.is_empty() {
        anyhow::bail!("no project server could be started");
    }
    info!(count = servers.len(), "all project servers started, press Ctrl+C to stop");
    join_all(servers).await;
    info!("all servers stopped");
    Ok(())
}

/// Opens `url` in the default browser. A missing browser only costs a warning.
fn open_browser(url: &str) {
    match open::that_detached(url) {
        Ok(()) => info!(url, "opened browser"),
        Err(error) => warn!(url, %error, "cannot open browser"),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
