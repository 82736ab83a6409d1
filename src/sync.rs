//! Copies the shared front-end modules from the common directory into each
//! project.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{NoExpand, Regex};
use tracing::{info, warn};
use walkdir::WalkDir;

struct ModuleGroup {
    dir: &'static str,
    files: &'static [&'static str],
}

const MODULE_GROUPS: [ModuleGroup; 4] = [
    ModuleGroup {
        dir: "core",
        files: &["logger.js", "config.js", "app-init.js", "index.js"],
    },
    ModuleGroup {
        dir: "ui",
        files: &["modal.js", "spinner.js", "index.js"],
    },
    ModuleGroup {
        dir: "utils",
        files: &["format.js", "dom.js", "date.js", "index.js"],
    },
    ModuleGroup {
        dir: "services",
        files: &["auth.js", "navigation.js", "data-loader.js", "index.js"],
    },
];

/// Words shown fully upper-cased in display names.
const ACRONYMS: [&str; 2] = ["nrd", "rrhh"];

const LEVELS_EXPORT: &str = "export { LOG_LEVELS, LOG_COLORS };";

static LOGGER_INSTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export const logger = new Logger\('[^']*'").expect("valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("project {} not found", path.display())]
    MissingProject { path: PathBuf },

    #[error("cannot copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot update {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What one project sync did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: usize,
    pub skipped: Vec<PathBuf>,
    pub logger_customized: bool,
}

/// Outcome of syncing several projects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub total: usize,
}

/// Human name of a project, `nrd-control-cajas` → `NRD Control Cajas`.
pub fn display_name(project: &str) -> String {
    project
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            if ACRONYMS.contains(&word.to_ascii_lowercase().as_str()) {
                return word.to_uppercase();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Syncs the common modules, tools and service worker into `project`.
///
/// Missing sources are skipped and listed in the report.
pub fn sync_project(
    common_dir: &Path,
    projects_dir: &Path,
    project: &str,
) -> Result<SyncReport, SyncError> {
    let project_root = projects_dir.join(project);
    if !project_root.is_dir() {
        return Err(SyncError::MissingProject { path: project_root });
    }
    info!(project, "syncing common modules");

    let mut report = SyncReport::default();
    let modules_dst = project_root.join("common").join("modules");
    for group in &MODULE_GROUPS {
        let dst_dir = modules_dst.join(group.dir);
        create_dir(&dst_dir)?;
        for file in group.files {
            let src = common_dir.join("modules").join(group.dir).join(file);
            copy_if_present(&src, &dst_dir.join(file), &mut report)?;
        }
    }

    copy_if_present(
        &common_dir.join("README.md"),
        &project_root.join("common").join("README.md"),
        &mut report,
    )?;

    let tools_src = common_dir.join("tools");
    if tools_src.is_dir() {
        let tools_dst = project_root.join("tools");
        if tools_dst.exists() {
            fs::remove_dir_all(&tools_dst).map_err(|source| SyncError::Io {
                path: tools_dst.clone(),
                source,
            })?;
        }
        report.copied += copy_tree(&tools_src, &tools_dst)?;
    } else {
        warn!(path = %tools_src.display(), "common tools missing, skipping");
        report.skipped.push(tools_src);
    }

    copy_if_present(
        &common_dir.join("service-worker.js"),
        &project_root.join("service-worker.js"),
        &mut report,
    )?;

    let logger = modules_dst.join("core").join("logger.js");
    report.logger_customized = customize_logger(&logger, &display_name(project))?;

    info!(
        project,
        copied = report.copied,
        skipped = report.skipped.len(),
        logger = report.logger_customized,
        "project synced"
    );
    Ok(report)
}

/// Syncs every project, logging failures instead of stopping at them.
pub fn sync_all(common_dir: &Path, projects_dir: &Path, projects: &[String]) -> SyncSummary {
    let mut summary = SyncSummary {
        synced: 0,
        total: projects.len(),
    };
    for project in projects {
        match sync_project(common_dir, projects_dir, project) {
            Ok(_) => summary.synced += 1,
            Err(error) => warn!(project = %project, "{error:#}, skipping"),
        }
    }
    summary
}

/// Points the project's logger at its display name, or appends a default
/// logger export when the file has none. Returns whether the file changed.
pub fn customize_logger(logger: &Path, display_name: &str) -> Result<bool, SyncError> {
    if !logger.is_file() {
        return Ok(false);
    }
    let io_error = |source| SyncError::Io {
        path: logger.to_path_buf(),
        source,
    };
    let content = fs::read_to_string(logger).map_err(io_error)?;

    let replacement = format!("export const logger = new Logger('{display_name}'");
    let updated = if LOGGER_INSTANCE.is_match(&content) {
        LOGGER_INSTANCE
            .replace_all(&content, NoExpand(&replacement))
            .into_owned()
    } else if !content.contains("export const logger") {
        let export = default_logger_export(display_name);
        if content.contains(LEVELS_EXPORT) {
            content.replacen(LEVELS_EXPORT, &format!("{LEVELS_EXPORT}{export}"), 1)
        } else {
            format!("{content}{export}")
        }
    } else {
        content.clone()
    };

    if updated == content {
        return Ok(false);
    }
    fs::write(logger, updated).map_err(io_error)?;
    info!(name = display_name, "logger customized");
    Ok(true)
}

fn default_logger_export(display_name: &str) -> String {
    format!(
        "\n// Default logger instance for {display_name}\n\
         export const logger = new Logger('{display_name}', {{\n  \
         logLevel: LOG_LEVELS.DEBUG,\n  \
         enableColors: true,\n  \
         enableTimestamp: true,\n  \
         enableStack: false\n\
         }});\n\n\
         if (typeof window !== 'undefined') {{\n  \
         window.logger = logger;\n\
         }}\n"
    )
}

fn create_dir(dir: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dir).map_err(|source| SyncError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn copy_if_present(src: &Path, dst: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    if !src.is_file() {
        warn!(path = %src.display(), "source missing, skipping");
        report.skipped.push(src.to_path_buf());
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        create_dir(parent)?;
    }
    fs::copy(src, dst).map_err(|source| SyncError::Copy {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    })?;
    report.copied += 1;
    Ok(())
}

/// Recursively copies `src` into `dst`, returning the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, SyncError> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|error| SyncError::Io {
            path: src.to_path_buf(),
            source: error.into(),
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|source| SyncError::Copy {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                source,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write;

    const LOGGER: &str = "class Logger {}\nexport const logger = new Logger('NRD Common', { logLevel: 1 });\n";

    fn common(dir: &Path) -> PathBuf {
        let common = dir.join("nrd-common");
        write(&common.join("modules/core/logger.js"), LOGGER);
        write(&common.join("modules/core/index.js"), "export * from './logger.js';");
        write(&common.join("modules/ui/modal.js"), "// modal");
        write(&common.join("tools/server/server.py"), "# server");
        write(&common.join("tools/update-version/update-version.py"), "# version");
        write(&common.join("service-worker.js"), "// sw");
        common
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("nrd-control-cajas"), "NRD Control Cajas");
        assert_eq!(display_name("nrd-rrhh"), "NRD RRHH");
        assert_eq!(display_name("nrd-flujo-caja"), "NRD Flujo Caja");
    }

    #[test]
    fn copies_present_files_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let common = common(dir.path());
        fs::create_dir(dir.path().join("nrd-compras")).unwrap();
        write(&dir.path().join("nrd-compras/tools/stale.py"), "# stale");

        let report = sync_project(&common, dir.path(), "nrd-compras").unwrap();

        let project = dir.path().join("nrd-compras");
        assert_eq!(
            fs::read_to_string(project.join("common/modules/ui/modal.js")).unwrap(),
            "// modal"
        );
        assert!(project.join("common/modules/services").is_dir());
        assert!(project.join("tools/server/server.py").is_file());
        assert!(!project.join("tools/stale.py").exists());
        assert_eq!(fs::read_to_string(project.join("service-worker.js")).unwrap(), "// sw");
        // logger, core index, modal, two tools, service worker
        assert_eq!(report.copied, 6);
        assert!(report.skipped.contains(&common.join("README.md")));
        assert!(report.skipped.contains(&common.join("modules/utils/dom.js")));
        assert!(report.logger_customized);

        let logger = fs::read_to_string(project.join("common/modules/core/logger.js")).unwrap();
        assert!(logger.contains("new Logger('NRD Compras', { logLevel: 1 })"));
    }

    #[test]
    fn missing_project_fails_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let common = common(dir.path());

        let error = sync_project(&common, dir.path(), "nrd-nope").unwrap_err();

        assert!(matches!(error, SyncError::MissingProject { .. }));
        assert!(!dir.path().join("nrd-nope").exists());
    }

    #[test]
    fn sync_all_counts_successes() {
        let dir = tempfile::tempdir().unwrap();
        let common = common(dir.path());
        fs::create_dir(dir.path().join("nrd-a")).unwrap();
        fs::create_dir(dir.path().join("nrd-b")).unwrap();

        let projects = ["nrd-a", "nrd-gone", "nrd-b"].map(String::from);
        let summary = sync_all(&common, dir.path(), &projects);

        assert_eq!(summary, SyncSummary { synced: 2, total: 3 });
    }

    #[test]
    fn appends_logger_export_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let logger = dir.path().join("logger.js");
        write(&logger, "class Logger {}\nexport { LOG_LEVELS, LOG_COLORS };\n// tail\n");

        assert!(customize_logger(&logger, "NRD Costos").unwrap());

        let content = fs::read_to_string(&logger).unwrap();
        let export_at = content.find("export const logger = new Logger('NRD Costos'").unwrap();
        assert!(content.find(LEVELS_EXPORT).unwrap() < export_at);
        assert!(export_at < content.find("// tail").unwrap());
    }

    #[test]
    fn customizing_twice_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let logger = dir.path().join("logger.js");
        write(&logger, LOGGER);

        assert!(customize_logger(&logger, "NRD Pedidos").unwrap());
        assert!(!customize_logger(&logger, "NRD Pedidos").unwrap());
        assert!(!customize_logger(&dir.path().join("missing.js"), "NRD Pedidos").unwrap());
    }
}
