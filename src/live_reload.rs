//! Polling live reload.
//!
//! A single background task rescans the project trees and remembers the newest
//! modification time of any watched file. Pages get a small script that polls
//! [`LIVE_ENDPOINT`] and reloads when that timestamp moves.

use std::{
    borrow::Cow,
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, UNIX_EPOCH},
};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

pub const LIVE_ENDPOINT: &str = "/_nrd_live";

pub const WATCHED_EXTENSIONS: [&str; 4] = ["html", "js", "css", "json"];

const BODY_END: &[u8] = b"</body>";

/// Latest modification time observed, in seconds since the epoch.
///
/// Only moves forward. Cloning shares the same cell.
#[derive(Clone, Debug, Default)]
pub struct WatchState(Arc<AtomicU64>);

impl WatchState {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Stores `latest` if it is nonzero and newer than the current value.
    pub fn advance(&self, latest: f64) -> bool {
        if latest <= 0.0 {
            return false;
        }
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (latest > f64::from_bits(bits)).then_some(latest.to_bits())
            })
            .is_ok()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("cannot scan {}", path.display())]
pub struct ScanError {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
}

#[derive(Clone, Debug)]
pub struct Watcher {
    roots: Arc<[PathBuf]>,
    state: WatchState,
    interval: Duration,
}

impl Watcher {
    pub fn new(roots: Vec<PathBuf>, state: WatchState, interval: Duration) -> Self {
        Self {
            roots: roots.into(),
            state,
            interval,
        }
    }

    /// Newest modification time among watched files, `0.0` when there are none.
    ///
    /// Missing roots are skipped, as are entries that vanish or cannot be
    /// read. A root that exists but cannot be opened fails the whole scan.
    pub fn scan(&self) -> Result<f64, ScanError> {
        self.roots
            .iter()
            .try_fold(0.0_f64, |latest, root| Ok(latest.max(scan_root(root)?)))
    }

    /// Runs one scan and publishes the result. Returns whether the watch
    /// timestamp moved.
    pub fn poll_once(&self) -> Result<bool, ScanError> {
        let latest = self.scan()?;
        Ok(self.state.advance(latest))
    }

    /// Polls forever on the configured interval. Failed scans are logged and
    /// retried on the next tick.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let watcher = self.clone();
                match tokio::task::spawn_blocking(move || watcher.poll_once()).await {
                    Ok(Ok(true)) => debug!(t = self.state.get(), "watched files changed"),
                    Ok(Ok(false)) => {}
                    Ok(Err(error)) => warn!("{error:#}, retrying in {:?}", self.interval),
                    Err(error) => warn!(%error, "live reload scan aborted, retrying"),
                }
            }
        })
    }
}

fn scan_root(root: &Path) -> Result<f64, ScanError> {
    let mut latest = 0.0_f64;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                if source.io_error().is_some_and(|e| e.kind() == io::ErrorKind::NotFound) {
                    trace!(root = %root.display(), "project root missing, skipping");
                    return Ok(0.0);
                }
                return Err(ScanError {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(error) => {
                trace!(%error, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_watched(entry.path()) {
            continue;
        }
        match modified_secs(&entry) {
            Ok(mtime) => latest = latest.max(mtime),
            Err(error) => trace!(path = %entry.path().display(), %error, "skipping file"),
        }
    }
    Ok(latest)
}

fn is_watched(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WATCHED_EXTENSIONS
                .iter()
                .any(|watched| ext.eq_ignore_ascii_case(watched))
        })
}

fn modified_secs(entry: &walkdir::DirEntry) -> io::Result<f64> {
    let modified = entry.metadata().map_err(io::Error::other)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default())
}

/// Browser side of live reload. The first answer is the baseline; any later
/// change reloads the page.
pub fn client_script(poll_interval: Duration) -> String {
    format!(
        "<script>(function(){{\n\
         var last=null;function check(){{fetch(\"{LIVE_ENDPOINT}\",{{cache:\"no-store\"}}).then(function(r){{return r.json();}}).then(function(d){{\n\
         if(d.t&&d.t!==last){{if(last!==null)location.reload();last=d.t;}}\n\
         }}).catch(function(){{}});}}\n\
         setInterval(check,{});check();\n\
         }})();</script>",
        poll_interval.as_millis()
    )
}

/// Inserts `script` right before the first `</body>`. Documents without one
/// come back untouched.
pub fn inject_script<'a>(html: &'a [u8], script: &str) -> Cow<'a, [u8]> {
    let Some(at) = html
        .windows(BODY_END.len())
        .position(|window| window == BODY_END)
    else {
        return Cow::Borrowed(html);
    };

    let mut out = Vec::with_capacity(html.len() + script.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(script.as_bytes());
    out.extend_from_slice(&html[at..]);
    Cow::Owned(out)
}

/// Watch state plus the script handed to HTML pages.
#[derive(Clone, Debug)]
pub struct LiveReload {
    state: WatchState,
    script: Arc<str>,
}

impl LiveReload {
    pub fn new(state: WatchState, client_interval: Duration) -> Self {
        Self {
            state,
            script: client_script(client_interval).into(),
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}
