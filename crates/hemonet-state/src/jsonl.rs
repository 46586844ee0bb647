//! Newline-delimited JSON error log
//!
//! Each entry is serialized to one line and written with a single
//! `write_all` while holding the file lock, so concurrent appenders never
//! interleave partial lines.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::StateError;
use crate::error_log::{ErrorLog, ErrorLogEntry};
use crate::Result;

/// File-backed error log; one JSON object per line.
#[derive(Debug)]
pub struct JsonlErrorLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlErrorLog {
    /// Open (or create) the log at `path` in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Strictly read every entry, failing on the first undecodable line.
    pub fn read_all(&self) -> Result<Vec<ErrorLogEntry>> {
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| StateError::CorruptEntry {
                    line: i + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

impl ErrorLog for JsonlErrorLog {
    fn append(&self, entry: ErrorLogEntry) {
        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, peer = %entry.peer, "dropping unserializable error log entry");
                return;
            }
        };
        line.push('\n');

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(error = %e, path = %self.path.display(), "failed to append error log entry");
        }
    }

    fn entries(&self) -> Vec<ErrorLogEntry> {
        match self.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "failed to read error log");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::ErrorAction;
    use tempfile::tempdir;

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("errors.jsonl");

        {
            let log = JsonlErrorLog::open(&path).unwrap();
            log.append(ErrorLogEntry::new(
                "node-a",
                ErrorAction::Classify,
                "http://node-a/api/v1/classify",
                Some(500),
                "internal server error",
            ));
        }

        let log = JsonlErrorLog::open(&path).unwrap();
        log.append(ErrorLogEntry::new("node-b", ErrorAction::Other, "u", None, "timeout"));

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status_code, Some(500));
        assert_eq!(entries[1].peer, "node-b");
    }

    #[test]
    fn test_corrupt_line_is_reported_with_line_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("errors.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let log = JsonlErrorLog::open(&path).unwrap();
        match log.read_all() {
            Err(StateError::CorruptEntry { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected CorruptEntry, got {other:?}"),
        }
        // The lenient reader never fails.
        assert!(log.entries().is_empty());
    }
}
