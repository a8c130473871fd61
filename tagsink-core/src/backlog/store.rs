//! Durable FIFO over a plain directory: one file per entry, the filesystem
//! is the only authoritative index, nothing is ever rewritten in place.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tagsink_config::BacklogConfig;
use tracing::{error, warn};
use uuid::Uuid;

/// File-per-entry backlog queue.
///
/// Entry identity is the file name (`{epoch_millis}_{reason}_{uuid}.json`),
/// which is unique without any cross-process coordination; ordering is by
/// last-modified time. A single drain consumer is assumed.
#[derive(Debug)]
pub struct BacklogStore {
    dir: PathBuf,
    enabled: bool,
}

impl BacklogStore {
    /// Creates the store and its directory. A directory that cannot be
    /// created is logged but not fatal; enqueues will then fail per call.
    pub fn new(config: &BacklogConfig) -> Self {
        if config.enabled {
            if let Err(err) = fs::create_dir_all(&config.dir) {
                warn!(
                    dir = %config.dir.display(),
                    error = %err,
                    "could not create backlog directory"
                );
            }
        }
        Self { dir: config.dir.clone(), enabled: config.enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Persists the raw payload verbatim; returns the entry path, or `None`
    /// when the write failed (the caller treats the message as dropped).
    pub fn enqueue(&self, payload: &[u8], reason: &str) -> Option<PathBuf> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let name = format!("{millis}_{reason}_{}.json", Uuid::new_v4());
        let path = self.dir.join(name);

        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(payload));
        match result {
            Ok(()) => Some(path),
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = %err,
                    "failed to write backlog entry"
                );
                None
            }
        }
    }

    /// Up to `limit` entries, oldest first by modification time, file name
    /// as a stable tie-break within one call.
    pub fn list_oldest_first(&self, limit: usize) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<(SystemTime, PathBuf)> = entries
            .flatten()
            .filter(|entry| {
                entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            })
            .map(|entry| {
                let mtime = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (mtime, entry.path())
            })
            .collect();

        files.sort_by(|a, b| a.cmp(b));
        files.truncate(limit);
        files.into_iter().map(|(_, path)| path).collect()
    }

    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Removes an entry; a file that is already gone is not an error.
    pub fn delete(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to delete backlog entry"
                );
            }
        }
    }
}
