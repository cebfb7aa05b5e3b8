// mtime-keyed snapshots of parsed feed files
// A snapshot is immutable; a changed file produces a new snapshot that
// replaces the old one wholesale

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::typosquat::TopDomains;
use super::FeedError;

/// Parsed contents of one feed file at one modification time
#[derive(Debug)]
pub struct FeedSnapshot<T> {
    pub path: PathBuf,
    pub mtime: SystemTime,
    pub entries: T,
}

pub type SharedSnapshot<T> = Option<Arc<FeedSnapshot<T>>>;

/// Last known good snapshot of every feed
#[derive(Debug, Default)]
pub struct FeedCaches {
    pub openphish: SharedSnapshot<HashSet<String>>,
    pub urlhaus: SharedSnapshot<HashSet<String>>,
    pub phishtank: SharedSnapshot<HashSet<String>>,
    pub certpl: SharedSnapshot<HashSet<String>>,
    pub sans: SharedSnapshot<HashSet<String>>,
    pub top_domains: SharedSnapshot<TopDomains>,
}

impl FeedCaches {
    /// Forget every snapshot; the next lookup reparses all files
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn read_if_changed<T>(
    current: &SharedSnapshot<T>,
    path: &Path,
) -> Result<Option<(SystemTime, String)>, FeedError> {
    let mtime = fs::metadata(path)?.modified()?;
    if let Some(snapshot) = current {
        if snapshot.path == path && snapshot.mtime == mtime {
            return Ok(None);
        }
    }
    Ok(Some((mtime, fs::read_to_string(path)?)))
}

/// Return the snapshot for `path`, reparsing only when its mtime changed.
///
/// A missing or unreadable file keeps the previous snapshot. A file that
/// fails to parse is recorded as empty at its new mtime so the failure is
/// not retried until the file changes again.
pub fn refresh<T, F>(feed: &str, current: &SharedSnapshot<T>, path: &Path, parse: F) -> SharedSnapshot<T>
where
    T: Default,
    F: FnOnce(&str) -> Result<T, FeedError>,
{
    let (mtime, raw) = match read_if_changed(current, path) {
        Ok(Some(changed)) => changed,
        Ok(None) => return current.clone(),
        Err(FeedError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(feed, path = %path.display(), "Feed file not present");
            return current.clone();
        },
        Err(e) => {
            warn!(feed, path = %path.display(), error = %e, "Failed to read feed file");
            return current.clone();
        },
    };

    let entries = match parse(&raw) {
        Ok(entries) => {
            info!(feed, path = %path.display(), "Loaded feed file");
            entries
        },
        Err(e) => {
            warn!(feed, path = %path.display(), error = %e, "Failed to parse feed file");
            T::default()
        },
    };

    Some(Arc::new(FeedSnapshot {
        path: path.to_path_buf(),
        mtime,
        entries,
    }))
}
