//! Classifier proxy.
//!
//! A [`ClassifierProxy`] hides whether predictions come from an in-process
//! [`Model`] or a remote classification service. Both return an
//! index-aligned [`Prediction`] for the batch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ClassifyError, Observation};
use hemonet_state::ErrorLog;
use peer_client::{Prediction, RemoteClient, RemoteConfig};

/// Opaque local prediction capability.
#[async_trait]
pub trait Model: Send + Sync {
    /// Predict labels and scores for `observations`, index-aligned.
    async fn predict(&self, observations: &[Observation]) -> anyhow::Result<Prediction>;
}

/// Where predictions come from.
#[derive(Clone)]
pub enum ClassifierHandle {
    Local(Arc<dyn Model>),
    Remote(RemoteConfig),
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierHandle::Local(_) => f.write_str("Local(..)"),
            ClassifierHandle::Remote(config) => f.debug_tuple("Remote").field(config).finish(),
        }
    }
}

#[derive(Clone)]
enum Backend {
    Local(Arc<dyn Model>),
    Remote(RemoteClient),
}

/// Uniform `classify` over a local model or a remote service.
#[derive(Clone)]
pub struct ClassifierProxy {
    name: String,
    backend: Backend,
}

impl ClassifierProxy {
    /// Build the proxy. Remote failures are recorded to `error_log`.
    pub fn new(handle: ClassifierHandle, error_log: Arc<dyn ErrorLog>) -> Result<Self, ClassifyError> {
        match handle {
            ClassifierHandle::Local(model) => Ok(Self::local(model)),
            ClassifierHandle::Remote(config) => {
                let name = config.name.clone();
                let client = RemoteClient::new(config, error_log)?;
                Ok(Self {
                    name,
                    backend: Backend::Remote(client),
                })
            }
        }
    }

    pub fn local(model: Arc<dyn Model>) -> Self {
        Self {
            name: crate::voting::LOCAL_VOTER.to_string(),
            backend: Backend::Local(model),
        }
    }

    /// Service name used in logs and error entries.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }

    /// Classify a batch. Empty input yields an empty prediction.
    pub async fn classify(&self, observations: &[Observation]) -> Result<Prediction, ClassifyError> {
        if observations.is_empty() {
            return Ok(Prediction::default());
        }

        match &self.backend {
            Backend::Local(model) => {
                let prediction = model.predict(observations).await.map_err(|e| {
                    ClassifyError::ModelFailure {
                        classifier: self.name.clone(),
                        source: e.into(),
                    }
                })?;
                prediction
                    .check_shape(observations.len())
                    .map_err(|message| ClassifyError::ModelFailure {
                        classifier: self.name.clone(),
                        source: message.into(),
                    })?;
                debug!(classifier = %self.name, observations = observations.len(), "local prediction");
                Ok(prediction)
            }
            Backend::Remote(client) => Ok(client.classify(observations).await?),
        }
    }
}

impl std::fmt::Debug for ClassifierProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierProxy")
            .field("name", &self.name)
            .field("remote", &self.is_remote())
            .finish()
    }
}
