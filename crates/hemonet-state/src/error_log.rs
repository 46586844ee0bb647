//! Error log trait and entry schema
//!
//! Every remote call that fails (non-2xx, transport error, timeout, malformed
//! body) is recorded as one [`ErrorLogEntry`]. Sinks are append-only and must
//! accept concurrent appends from parallel peer calls; one `append` is one
//! atomic write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which remote operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Single or batch classification request
    Classify,
    /// Data-share push
    ShareData,
    /// Anything else (metadata refresh)
    Other,
}

impl std::fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorAction::Classify => write!(f, "classify"),
            ErrorAction::ShareData => write!(f, "share_data"),
            ErrorAction::Other => write!(f, "other"),
        }
    }
}

/// A single failed remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Peer name or external service name
    pub peer: String,
    pub action: ErrorAction,
    pub url: String,
    /// HTTP status when a response was received
    pub status_code: Option<u16>,
    pub message: String,
}

impl ErrorLogEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(
        peer: impl Into<String>,
        action: ErrorAction,
        url: impl Into<String>,
        status_code: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            peer: peer.into(),
            action,
            url: url.into(),
            status_code,
            message: message.into(),
        }
    }
}

/// Append-only sink for failed remote calls.
///
/// Guarantees:
/// - `append` never fails or panics; sink-level problems are reported through
///   `tracing` and the entry is dropped.
/// - Entries from concurrent appends are never interleaved.
pub trait ErrorLog: Send + Sync {
    /// Record one failed call.
    fn append(&self, entry: ErrorLogEntry);

    /// All entries recorded so far, oldest first.
    fn entries(&self) -> Vec<ErrorLogEntry>;

    /// Entries recorded for a specific peer.
    fn entries_for(&self, peer: &str) -> Vec<ErrorLogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.peer == peer)
            .collect()
    }
}
