//! Error types for hemonet-state

use thiserror::Error;

/// Errors raised while opening or reading an error log.
///
/// Appending never surfaces these; only construction and read-back do.
#[derive(Error, Debug)]
pub enum StateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be decoded
    #[error("Corrupt error log entry at line {line}: {reason}")]
    CorruptEntry { line: usize, reason: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
