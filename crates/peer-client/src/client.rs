//! Remote classifier / peer node client
//!
//! One HTTP call per operation, bounded by the configured timeout. Failures
//! are appended to the error log and returned as [`ClientError`]; nothing is
//! retried.

use std::sync::Arc;
use std::time::Duration;

use hemonet_state::{ErrorAction, ErrorLog, ErrorLogEntry};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::ClientError;
use crate::wire::{ClassifyResponse, DatasetRequest, Prediction};
use crate::Result;

const USER_AGENT: &str = concat!("hemonet-peer-client/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one remote classifier or peer.
#[derive(Clone)]
pub struct RemoteClient {
    config: RemoteConfig,
    http_client: reqwest::Client,
    error_log: Arc<dyn ErrorLog>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("name", &self.config.name)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl RemoteClient {
    /// Create a client; failures will be recorded to `error_log`.
    pub fn new(config: RemoteConfig, error_log: Arc<dyn ErrorLog>) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                peer: config.name.clone(),
                message: e.to_string(),
            })?;

        Ok(RemoteClient {
            config,
            http_client,
            error_log,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Classify a batch of observations.
    ///
    /// A single observation goes to the classify endpoint; anything larger
    /// goes to the dataset endpoint as `{"dataset": [...]}`. The result is
    /// index-aligned with `observations`.
    pub async fn classify<T: Serialize + Sync>(&self, observations: &[T]) -> Result<Prediction> {
        match observations {
            [] => Ok(Prediction::default()),
            [single] => {
                let url = self.config.classify_url();
                let response: ClassifyResponse = self
                    .send_json(ErrorAction::Classify, self.http_client.post(&url).json(single), &url)
                    .await?;
                self.aligned(response.into(), 1, &url)
            }
            batch => {
                let url = self.config.dataset_url();
                let body = DatasetRequest { dataset: batch };
                let response: ClassifyResponse = self
                    .send_json(ErrorAction::Classify, self.http_client.post(&url).json(&body), &url)
                    .await?;
                self.aligned(response.into(), batch.len(), &url)
            }
        }
    }

    /// Fetch the remote classifier's descriptive metadata (opaque JSON).
    pub async fn fetch_metadata(&self) -> Result<serde_json::Value> {
        let url = self.config.dataset_url();
        self.send_json(ErrorAction::Other, self.http_client.get(&url), &url)
            .await
    }

    /// Push a shareable projection of an observation to the peer.
    ///
    /// Returns `true` on any 2xx. Failures are logged and reported as
    /// `false`; this never returns an error.
    pub async fn share_data<T: Serialize + Sync + ?Sized>(&self, projection: &T) -> bool {
        let url = self.config.data_url();
        let request = self.authorized(self.http_client.put(&url).json(projection));
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(peer = %self.config.name, status = %response.status(), "data share accepted");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                self.record(
                    ErrorAction::ShareData,
                    &url,
                    Some(status.as_u16()),
                    format!("HTTP {status}: {}", truncate(&body)),
                );
                false
            }
            Err(e) => {
                self.record(ErrorAction::ShareData, &url, None, transport_message(&e, &self.config));
                false
            }
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.header(AUTHORIZATION, format!("Token {token}")),
            None => request,
        }
    }

    async fn send_json<R: DeserializeOwned>(
        &self,
        action: ErrorAction,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<R> {
        let response = match self.authorized(request).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = transport_message(&e, &self.config);
                self.record(action, url, None, message.clone());
                return Err(self.unavailable(url, None, message));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let message = transport_message(&e, &self.config);
                self.record(action, url, Some(status.as_u16()), message.clone());
                return Err(self.unavailable(url, Some(status.as_u16()), message));
            }
        };

        if !status.is_success() {
            let message = format!("HTTP {status}: {}", truncate(&body));
            self.record(action, url, Some(status.as_u16()), message.clone());
            return Err(self.unavailable(url, Some(status.as_u16()), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            let message = format!("malformed response body: {e}");
            self.record(action, url, Some(status.as_u16()), message.clone());
            ClientError::ProtocolViolation {
                peer: self.config.name.clone(),
                url: url.to_string(),
                message,
            }
        })
    }

    fn aligned(&self, prediction: Prediction, expected: usize, url: &str) -> Result<Prediction> {
        match prediction.check_shape(expected) {
            Ok(()) => Ok(prediction),
            Err(message) => {
                self.record(ErrorAction::Classify, url, None, message.clone());
                Err(ClientError::ProtocolViolation {
                    peer: self.config.name.clone(),
                    url: url.to_string(),
                    message,
                })
            }
        }
    }

    fn unavailable(&self, url: &str, status: Option<u16>, message: String) -> ClientError {
        ClientError::Unavailable {
            peer: self.config.name.clone(),
            url: url.to_string(),
            status,
            message,
        }
    }

    fn record(&self, action: ErrorAction, url: &str, status: Option<u16>, message: String) {
        warn!(
            peer = %self.config.name,
            action = %action,
            url = %url,
            status = ?status,
            error = %message,
            "remote call failed"
        );
        self.error_log
            .append(ErrorLogEntry::new(&self.config.name, action, url, status, message));
    }
}

fn transport_message(e: &reqwest::Error, config: &RemoteConfig) -> String {
    if e.is_timeout() {
        format!("timed out after {}s", config.timeout_secs)
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

fn truncate(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
