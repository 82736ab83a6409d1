//! Cache-busting `?v=<version>` markers on local assets.
//!
//! Existing markers are always stripped before new ones are added, so running
//! the rewrite again just moves every marker to the newer version.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Sidecar written next to the entry file for client-side version checks.
pub const VERSION_FILE: &str = "version.json";

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\?v=\d+(["']|$)"#).expect("valid regex"));

static STYLESHEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<link[^>]*href=["'])([^"']*\.css)(["'][^>]*>)"#).expect("valid regex")
});

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<script[^>]*src=["'])([^"']+\.js)(["'][^>]*>)"#).expect("valid regex")
});

static SERVICE_WORKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(serviceWorker\.register\(["'])([^"']*service-worker\.js)(["'])"#)
        .expect("valid regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub v: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheBustError {
    #[error("{} not found", path.display())]
    MissingEntry { path: PathBuf },

    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Milliseconds since the epoch.
pub fn current_version() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Rewrites every local stylesheet, script and service worker reference in
/// `html` to carry `?v=<version>`.
pub fn bust(html: &str, version: u64) -> String {
    let html = MARKER.replace_all(html, "$1");
    let html = STYLESHEET.replace_all(&html, |caps: &Captures| mark(caps, version));
    let html = SCRIPT.replace_all(&html, |caps: &Captures| mark(caps, version));
    SERVICE_WORKER
        .replace_all(&html, |caps: &Captures| mark(caps, version))
        .into_owned()
}

fn mark(caps: &Captures, version: u64) -> String {
    let url = &caps[2];
    if is_external(url) || url.contains("?v=") {
        return caps[0].to_string();
    }
    format!("{}{url}?v={version}{}", &caps[1], &caps[3])
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Busts the project's entry file in place and records `version` in
/// [`VERSION_FILE`] beside it.
pub fn update_project(
    project_root: &Path,
    entry_file: &str,
    version: u64,
) -> Result<PathBuf, CacheBustError> {
    let entry = project_root.join(entry_file);
    if !entry.is_file() {
        return Err(CacheBustError::MissingEntry { path: entry });
    }

    let html = fs::read_to_string(&entry).map_err(|source| CacheBustError::Read {
        path: entry.clone(),
        source,
    })?;
    fs::write(&entry, bust(&html, version)).map_err(|source| CacheBustError::Write {
        path: entry.clone(),
        source,
    })?;

    let record_path = entry.with_file_name(VERSION_FILE);
    let record = serde_json::to_string(&VersionRecord { v: version })?;
    fs::write(&record_path, record).map_err(|source| CacheBustError::Write {
        path: record_path.clone(),
        source,
    })?;

    info!(version, entry = %entry.display(), "version updated");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
<head>
  <link rel="stylesheet" href="assets/styles/styles.css">
  <link rel="stylesheet" href="https://cdn.example.com/lib.css">
  <link rel="icon" href="favicon.ico">
  <script src="common/modules/core/index.js" type="module"></script>
  <script src='https://cdn.example.com/firebase.js'></script>
</head>
<body>
  <script>navigator.serviceWorker.register('service-worker.js');</script>
</body>
</html>"#;

    #[test]
    fn adds_markers_to_local_assets() {
        assert_eq!(
            bust(r#"<script src="app.js"></script>"#, 170000000),
            r#"<script src="app.js?v=170000000"></script>"#
        );

        let out = bust(PAGE, 7);
        assert!(out.contains(r#"href="assets/styles/styles.css?v=7">"#));
        assert!(out.contains(r#"src="common/modules/core/index.js?v=7" type="module">"#));
        assert!(out.contains("register('service-worker.js?v=7')"));
    }

    #[test]
    fn leaves_external_and_other_links_alone() {
        let out = bust(PAGE, 7);
        assert!(out.contains(r#"href="https://cdn.example.com/lib.css">"#));
        assert!(out.contains("src='https://cdn.example.com/firebase.js'>"));
        assert!(out.contains(r#"href="favicon.ico">"#));
    }

    #[test]
    fn second_pass_replaces_markers() {
        let once = bust(PAGE, 1);
        let twice = bust(&once, 2);

        assert_eq!(twice, bust(PAGE, 2));
        assert!(!twice.contains("?v=1"));
        assert_eq!(twice.matches("?v=").count(), 3);
        assert_eq!(bust(&twice, 2), twice);
    }

    #[test]
    fn no_match_is_a_no_op() {
        let html = "<p>nothing to version here</p>";
        assert_eq!(bust(html, 9), html);
    }

    #[test]
    fn update_project_writes_entry_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), PAGE).unwrap();

        let entry = update_project(dir.path(), "index.html", 1234).unwrap();

        let html = fs::read_to_string(&entry).unwrap();
        assert!(html.contains("styles.css?v=1234"));
        let record: VersionRecord =
            serde_json::from_str(&fs::read_to_string(dir.path().join(VERSION_FILE)).unwrap())
                .unwrap();
        assert_eq!(record, VersionRecord { v: 1234 });
    }

    #[test]
    fn update_project_without_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let error = update_project(dir.path(), "index.html", 1).unwrap_err();
        assert!(matches!(error, CacheBustError::MissingEntry { .. }));
    }

    #[test]
    fn version_is_current_millis() {
        // 2020-01-01 in milliseconds.
        assert!(current_version() > 1_577_836_800_000);
    }
}
