use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

/// Port used by `system` when none is given.
pub const DEFAULT_SYSTEM_PORT: u16 = 80;

/// Port used by `serve` and the first port of `start-all`.
pub const DEFAULT_PROJECT_PORT: u16 = 8006;

pub const DEFAULT_PROJECT_PREFIX: &str = "nrd-";
pub const DEFAULT_ENTRY_FILE: &str = "index.html";

/// Directory holding the shared modules, relative to the projects directory.
pub const DEFAULT_COMMON_DIR: &str = "nrd-common";

/// Compiled library outputs served from the projects directory itself.
pub const DEFAULT_LIBRARY_PREFIXES: [&str; 2] = ["/nrd-common/dist/", "/nrd-data-access/dist/"];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How often the injected browser script asks for the watch timestamp.
pub const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Where the projects live and how they are recognized.
#[derive(Clone, Debug)]
pub struct WorkspaceConfig {
    pub projects_dir: PathBuf,
    pub prefix: String,
    pub entry_file: String,
    pub library_prefixes: Vec<String>,
}

impl WorkspaceConfig {
    /// Builds the workspace from optional overrides.
    ///
    /// Without an explicit directory the current directory is used, or its
    /// parent when the current directory is itself a project.
    pub fn resolve(
        projects_dir: Option<PathBuf>,
        current_dir: &Path,
        prefix: String,
        entry_file: String,
        library_prefixes: Vec<String>,
    ) -> Self {
        let projects_dir = projects_dir.unwrap_or_else(|| {
            if is_project_dir(current_dir, &prefix) {
                current_dir
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| current_dir.to_path_buf())
            } else {
                current_dir.to_path_buf()
            }
        });

        let library_prefixes = if library_prefixes.is_empty() {
            DEFAULT_LIBRARY_PREFIXES.iter().map(|p| p.to_string()).collect()
        } else {
            library_prefixes
        };

        Self {
            projects_dir,
            prefix,
            entry_file,
            library_prefixes,
        }
    }

    /// Name of the project the given directory belongs to, if it is one.
    pub fn project_of<'a>(&self, dir: &'a Path) -> Option<&'a str> {
        is_project_dir(dir, &self.prefix)
            .then(|| dir.file_name().and_then(|name| name.to_str()))
            .flatten()
    }

    pub fn common_dir(&self) -> PathBuf {
        self.projects_dir.join(DEFAULT_COMMON_DIR)
    }
}

fn is_project_dir(dir: &Path, prefix: &str) -> bool {
    dir.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(prefix))
}

/// Settings for one HTTP server instance.
#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub port: u16,
    pub live_reload: bool,
    pub poll_interval: Duration,
    pub update_version: bool,
    /// Open the served page in the default browser once listening.
    pub open_browser: bool,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
