//! Peer-Client: HTTP wire contract for hemonet classification peers
//!
//! Speaks the classification network protocol to a remote classifier or
//! peer node: single and batch classification, metadata retrieval and
//! data-share pushes. Every failed call is recorded to an
//! [`hemonet_state::ErrorLog`] before the error is returned.
//!
//! ## Layer 1 - Network
//!
//! Focus: one bounded HTTP call per operation, typed failures, no retries.

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::RemoteClient;
pub use config::{
    RemoteConfig, DEFAULT_CLASSIFY_ENDPOINT, DEFAULT_DATASET_ENDPOINT, DEFAULT_DATA_ENDPOINT,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::ClientError;
pub use wire::{Label, Prediction};

/// Result type for peer-client operations
pub type Result<T> = std::result::Result<T, ClientError>;
