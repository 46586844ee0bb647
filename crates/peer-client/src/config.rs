//! Remote endpoint configuration

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const DEFAULT_CLASSIFY_ENDPOINT: &str = "/api/v1/classify";
pub const DEFAULT_DATASET_ENDPOINT: &str = "/api/v1/classify_dataset";
pub const DEFAULT_DATA_ENDPOINT: &str = "/api/v1/data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn default_classify_endpoint() -> String {
    DEFAULT_CLASSIFY_ENDPOINT.to_string()
}

fn default_dataset_endpoint() -> String {
    DEFAULT_DATASET_ENDPOINT.to_string()
}

fn default_data_endpoint() -> String {
    DEFAULT_DATA_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Where and how to reach a remote classifier or peer node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Identifier used in logs and in the vote ledger
    pub name: String,
    /// Service root, e.g. `https://node-a.example.org`
    pub base_url: String,
    #[serde(default = "default_classify_endpoint")]
    pub classify_endpoint: String,
    #[serde(default = "default_dataset_endpoint")]
    pub dataset_endpoint: String,
    /// Data-share endpoint (peers only)
    #[serde(default = "default_data_endpoint")]
    pub data_endpoint: String,
    /// Sent as `Authorization: Token <token>` when present
    #[serde(default)]
    pub token: Option<String>,
    /// Per-call bound in seconds, at least 1
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    /// Create config for a service with the default endpoints.
    pub fn new(name: &str, base_url: &str) -> Self {
        RemoteConfig {
            name: name.to_string(),
            base_url: base_url.to_string(),
            classify_endpoint: default_classify_endpoint(),
            dataset_endpoint: default_dataset_endpoint(),
            data_endpoint: default_data_endpoint(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Reject settings no call could succeed with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig {
                peer: self.name.clone(),
                message: "timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Join `base_url` and an endpoint path without doubling slashes.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn classify_url(&self) -> String {
        self.url(&self.classify_endpoint)
    }

    pub fn dataset_url(&self) -> String {
        self.url(&self.dataset_endpoint)
    }

    pub fn data_url(&self) -> String {
        self.url(&self.data_endpoint)
    }
}
