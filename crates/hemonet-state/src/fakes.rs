//! In-memory error log
//!
//! Provides `MemoryErrorLog`, a `Vec`-backed sink that satisfies the
//! [`ErrorLog`] contract without touching the filesystem.

use std::sync::Mutex;

use crate::error_log::{ErrorLog, ErrorLogEntry};

/// In-memory error log backed by a `Mutex<Vec<ErrorLogEntry>>`.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    entries: Mutex<Vec<ErrorLogEntry>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorLog for MemoryErrorLog {
    fn append(&self, entry: ErrorLogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            // A panicking appender poisoned the lock; keep recording anyway.
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    fn entries(&self) -> Vec<ErrorLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_log::ErrorAction;
    use std::sync::Arc;

    #[test]
    fn test_append_and_read_back_in_order() {
        let log = MemoryErrorLog::new();
        log.append(ErrorLogEntry::new("a", ErrorAction::Classify, "u1", Some(500), "boom"));
        log.append(ErrorLogEntry::new("b", ErrorAction::ShareData, "u2", None, "refused"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].peer, "a");
        assert_eq!(entries[1].peer, "b");
        assert_eq!(log.entries_for("b").len(), 1);
    }

    #[test]
    fn test_concurrent_appends_are_all_recorded() {
        let log = Arc::new(MemoryErrorLog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        log.append(ErrorLogEntry::new(
                            format!("peer-{i}"),
                            ErrorAction::Classify,
                            "u",
                            None,
                            format!("failure {j}"),
                        ));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.len(), 200);
        for i in 0..8 {
            assert_eq!(log.entries_for(&format!("peer-{i}")).len(), 25);
        }
    }
}
