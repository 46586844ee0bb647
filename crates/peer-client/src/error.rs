//! Error types for peer-client

use thiserror::Error;

/// Errors returned by remote calls.
///
/// Every variant produced by a call has already been written to the error
/// log by the time the caller sees it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Connection refused, timeout, or a non-2xx response
    #[error("{peer} unavailable at {url}: {message}")]
    Unavailable {
        peer: String,
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The response arrived but does not follow the wire contract
    #[error("{peer} violated the classification protocol at {url}: {message}")]
    ProtocolViolation {
        peer: String,
        url: String,
        message: String,
    },

    /// The HTTP client could not be built from the configuration
    #[error("invalid remote configuration for {peer}: {message}")]
    InvalidConfig { peer: String, message: String },
}

impl ClientError {
    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unavailable { status, .. } => *status,
            _ => None,
        }
    }
}
