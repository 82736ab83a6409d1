use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("cannot read projects directory {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no '{prefix}*' projects with {entry_file} found in {}", path.display())]
    NoProjects {
        path: PathBuf,
        prefix: String,
        entry_file: String,
    },

    #[error("project '{name}' not found in {}; available projects: {available}", path.display())]
    UnknownProject {
        name: String,
        path: PathBuf,
        available: String,
    },
}

/// The set of projects served side by side, sorted by name.
#[derive(Clone, Debug)]
pub struct ProjectRegistry {
    projects_dir: PathBuf,
    entry_file: String,
    names: Vec<String>,
}

impl ProjectRegistry {
    /// Scans `projects_dir` for subdirectories named `<prefix>*` that contain
    /// `entry_file`.
    pub fn discover<P: AsRef<Path>>(
        projects_dir: P,
        prefix: &str,
        entry_file: &str,
    ) -> Result<Self, RegistryError> {
        let projects_dir = projects_dir.as_ref();
        let entries = fs::read_dir(projects_dir).map_err(|source| RegistryError::Unreadable {
            path: projects_dir.to_path_buf(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join(entry_file).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();

        if names.is_empty() {
            return Err(RegistryError::NoProjects {
                path: projects_dir.to_path_buf(),
                prefix: prefix.to_string(),
                entry_file: entry_file.to_string(),
            });
        }

        debug!(projects = ?names, "discovered projects");
        Ok(Self::from_names(projects_dir, entry_file, names))
    }

    pub fn from_names<P: AsRef<Path>>(projects_dir: P, entry_file: &str, names: Vec<String>) -> Self {
        Self {
            projects_dir: projects_dir.as_ref().to_path_buf(),
            entry_file: entry_file.to_string(),
            names,
        }
    }

    /// Registry holding only `name`, which must be a directory directly under
    /// `projects_dir`. Trailing slashes are dropped, so `nrd-a/` names
    /// `nrd-a`. The error lists whatever projects could be found.
    pub fn single<P: AsRef<Path>>(
        projects_dir: P,
        name: &str,
        prefix: &str,
        entry_file: &str,
    ) -> Result<Self, RegistryError> {
        let projects_dir = projects_dir.as_ref();
        let trimmed = name.trim_end_matches(['/', '\\']);
        if is_plain_name(trimmed) && projects_dir.join(trimmed).is_dir() {
            return Ok(Self::from_names(projects_dir, entry_file, vec![trimmed.to_string()]));
        }

        let available = Self::discover(projects_dir, prefix, entry_file)
            .map(|registry| registry.names.join(", "))
            .unwrap_or_else(|_| "none".to_string());
        Err(RegistryError::UnknownProject {
            name: name.to_string(),
            path: projects_dir.to_path_buf(),
            available,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    pub fn entry_file(&self) -> &str {
        &self.entry_file
    }

    pub fn project_root(&self, name: &str) -> PathBuf {
        self.projects_dir.join(name)
    }

    /// Project that serves paths no other rule claims.
    pub fn default_project(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.names.iter().map(|name| self.project_root(name)).collect()
    }
}

fn is_plain_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains(['/', '\\'])
}
