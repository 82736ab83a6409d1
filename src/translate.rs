//! Mapping of request paths onto the project directories.
//!
//! Resolution order:
//!
//! 1. `/<project>/<rest>` resolves under that project (`<rest>` empty means the
//!    entry file), and `/<project>` resolves to the entry file.
//! 2. Compiled library outputs (`/nrd-common/dist/...`) resolve under the
//!    projects directory.
//! 3. `/` asks for the registry listing.
//! 4. Anything else resolves under the default project.

use std::path::{Component, Path, PathBuf};

use crate::registry::ProjectRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Translation {
    /// The root page enumerating every project.
    Listing,
    File(PathBuf),
}

pub fn translate_path(
    request_path: &str,
    registry: &ProjectRegistry,
    library_prefixes: &[String],
) -> Translation {
    let path = request_path.split('?').next().unwrap_or_default();
    let path = path.split('#').next().unwrap_or_default();
    let path = url_escape::decode(path);
    let path = path.as_ref();

    for project in registry.names() {
        let Some(rest) = path
            .strip_prefix('/')
            .and_then(|p| p.strip_prefix(project.as_str()))
        else {
            continue;
        };
        if rest.is_empty() || rest == "/" {
            return Translation::File(entry_of(registry, project));
        }
        if let Some(rest) = rest.strip_prefix('/') {
            return Translation::File(resolve(&registry.project_root(project), rest));
        }
    }

    if library_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return Translation::File(resolve(registry.projects_dir(), path));
    }

    if path.is_empty() || path == "/" {
        return Translation::Listing;
    }

    // TODO: answer 404 here instead of borrowing the default project once the
    // sites stop relying on root-relative asset paths.
    let base = match registry.default_project() {
        Some(project) => registry.project_root(project),
        None => registry.projects_dir().to_path_buf(),
    };
    Translation::File(resolve(&base, path))
}

fn entry_of(registry: &ProjectRegistry, project: &str) -> PathBuf {
    resolve(&registry.project_root(project), registry.entry_file())
}

fn resolve(base: &Path, rest: &str) -> PathBuf {
    normalize(&base.join(rest.trim_start_matches('/')))
}

/// Lexically drops `.` and folds `..`, like resolving a path that may not exist.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LIBRARY_PREFIXES;

    fn registry() -> ProjectRegistry {
        ProjectRegistry::from_names(
            "/srv/sites",
            "index.html",
            vec!["nrd-a".to_string(), "nrd-b".to_string()],
        )
    }

    fn translate(path: &str) -> Translation {
        let prefixes: Vec<String> = DEFAULT_LIBRARY_PREFIXES.iter().map(|p| p.to_string()).collect();
        translate_path(path, &registry(), &prefixes)
    }

    fn file(path: &str) -> Translation {
        Translation::File(PathBuf::from(path))
    }

    #[test]
    fn project_prefix_joins_project_root() {
        for rest in ["app.js", "css/styles.css", "assets/icons/icon-192.png", "data/x.json"] {
            assert_eq!(
                translate(&format!("/nrd-b/{rest}")),
                Translation::File(registry().project_root("nrd-b").join(rest)),
            );
        }
    }

    #[test]
    fn project_root_is_entry_file() {
        assert_eq!(translate("/nrd-a/"), file("/srv/sites/nrd-a/index.html"));
        assert_eq!(translate("/nrd-a"), file("/srv/sites/nrd-a/index.html"));
        assert_eq!(translate("/nrd-b/?v=1"), file("/srv/sites/nrd-b/index.html"));
    }

    #[test]
    fn root_is_listing() {
        assert_eq!(translate("/"), Translation::Listing);
        assert_eq!(translate("/?refresh=1"), Translation::Listing);
        assert_eq!(translate(""), Translation::Listing);
    }

    #[test]
    fn library_output_resolves_under_projects_dir() {
        assert_eq!(
            translate("/nrd-common/dist/nrd-common.js"),
            file("/srv/sites/nrd-common/dist/nrd-common.js"),
        );
        assert_eq!(
            translate("/nrd-data-access/dist/index.js"),
            file("/srv/sites/nrd-data-access/dist/index.js"),
        );
    }

    #[test]
    fn unknown_path_falls_back_to_first_project() {
        assert_eq!(translate("/favicon.ico"), file("/srv/sites/nrd-a/favicon.ico"));
        assert_eq!(translate("/nrd-c/app.js"), file("/srv/sites/nrd-a/nrd-c/app.js"));
    }

    #[test]
    fn similar_project_names_do_not_match() {
        assert_eq!(translate("/nrd-ab/app.js"), file("/srv/sites/nrd-a/nrd-ab/app.js"));
    }

    #[test]
    fn strips_query_fragment_and_decodes() {
        assert_eq!(
            translate("/nrd-b/my%20page.html?x=1#top"),
            file("/srv/sites/nrd-b/my page.html"),
        );
        assert_eq!(translate("/nrd-a/app.js#frag"), file("/srv/sites/nrd-a/app.js"));
    }

    #[test]
    fn dot_segments_are_folded() {
        assert_eq!(
            translate("/nrd-a/css/../js/./app.js"),
            file("/srv/sites/nrd-a/js/app.js"),
        );
    }
}
