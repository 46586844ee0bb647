//! Peer nodes of the classification network.
//!
//! A peer votes on observations when classification requests are enabled
//! and may receive shared observations. Sharing runs in the background and
//! never fails the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ClassifyError, Observation};
use crate::obs;
use hemonet_state::ErrorLog;
use peer_client::{ClientError, Prediction, RemoteClient, RemoteConfig};

/// When observations are pushed to a sharing peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// On every save.
    OnUpdate,
    /// Once the observation is finished.
    #[default]
    OnFinished,
}

/// A remote node of the network.
#[derive(Debug, Clone)]
pub struct PeerNode {
    client: RemoteClient,
    classification_request: bool,
    data_sharing: bool,
    sharing_mode: SharingMode,
    last_metadata: Option<serde_json::Value>,
}

impl PeerNode {
    /// Peer that answers classification requests and receives no data.
    pub fn new(config: RemoteConfig, error_log: Arc<dyn ErrorLog>) -> Result<Self, ClientError> {
        Ok(Self {
            client: RemoteClient::new(config, error_log)?,
            classification_request: true,
            data_sharing: false,
            sharing_mode: SharingMode::default(),
            last_metadata: None,
        })
    }

    pub fn with_classification_request(mut self, enabled: bool) -> Self {
        self.classification_request = enabled;
        self
    }

    pub fn with_data_sharing(mut self, enabled: bool, mode: SharingMode) -> Self {
        self.data_sharing = enabled;
        self.sharing_mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        self.client.name()
    }

    pub fn classification_request_enabled(&self) -> bool {
        self.classification_request
    }

    pub fn data_sharing_enabled(&self) -> bool {
        self.data_sharing
    }

    pub fn sharing_mode(&self) -> SharingMode {
        self.sharing_mode
    }

    /// Metadata fetched by the last successful [`PeerNode::refresh_metadata`].
    pub fn last_metadata(&self) -> Option<&serde_json::Value> {
        self.last_metadata.as_ref()
    }

    /// Ask the peer to vote on a batch.
    pub async fn classify(&self, observations: &[Observation]) -> Result<Prediction, ClassifyError> {
        Ok(self.client.classify(observations).await?)
    }

    /// Push a projection to the peer. `false` on failure, which is logged.
    pub async fn share_data(&self, projection: &Observation) -> bool {
        self.client.share_data(projection).await
    }

    /// Re-fetch the peer's metadata. On failure the cached value is kept.
    pub async fn refresh_metadata(&mut self) -> bool {
        match self.client.fetch_metadata().await {
            Ok(metadata) => {
                self.last_metadata = Some(metadata);
                true
            }
            Err(e) => {
                debug!(peer = %self.name(), error = %e, "metadata refresh failed");
                false
            }
        }
    }
}

/// Whether `peer` should receive an observation in its current state.
pub fn should_share(peer: &PeerNode, is_finished: bool) -> bool {
    peer.data_sharing
        && match peer.sharing_mode {
            SharingMode::OnUpdate => true,
            SharingMode::OnFinished => is_finished,
        }
}

/// Copy of `observation` without the caller-listed fields.
pub fn share_projection(observation: &Observation, excluded: &[&str]) -> Observation {
    observation
        .iter()
        .filter(|(field, _)| !excluded.contains(field))
        .collect()
}

/// Outcome of one share fan-out, by peer name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ShareSummary {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub skipped: Vec<String>,
}

/// Push `projection` to every peer that should receive it, one task per
/// peer.
///
/// The returned handle resolves once every push finished; dropping it does
/// not cancel the pushes.
pub fn spawn_share(
    peers: &[PeerNode],
    projection: Observation,
    is_finished: bool,
) -> JoinHandle<ShareSummary> {
    let (targets, skipped): (Vec<&PeerNode>, Vec<&PeerNode>) =
        peers.iter().partition(|peer| should_share(peer, is_finished));
    obs::emit_share_dispatched(targets.len(), skipped.len(), is_finished);

    let projection = Arc::new(projection);
    let (names, tasks): (Vec<String>, Vec<JoinHandle<bool>>) = targets
        .into_iter()
        .map(|target| {
            let peer = target.clone();
            let projection = Arc::clone(&projection);
            let task = tokio::spawn(async move { peer.share_data(&projection).await });
            (target.name().to_string(), task)
        })
        .unzip();
    let skipped: Vec<String> = skipped.iter().map(|p| p.name().to_string()).collect();

    tokio::spawn(async move {
        let mut summary = ShareSummary {
            skipped,
            ..ShareSummary::default()
        };
        let outcomes = futures::future::join_all(tasks).await;
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(true) => summary.accepted.push(name),
                Ok(false) => summary.rejected.push(name),
                Err(e) => {
                    warn!(peer = %name, error = %e, "data share task failed");
                    summary.rejected.push(name);
                }
            }
        }
        summary
    })
}
